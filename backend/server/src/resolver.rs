//! # Country Resolution
//!
//! Decides which country a vote counts for. Strategies run in a configured
//! order and the first one that yields a code wins. Nothing here can fail a
//! request: a missing or malformed signal just moves on to the next strategy,
//! and the sentinel `UN` catches everything else.
//!
//! ## Strategies
//! - `platform`: hosting platform geo headers (`x-geo-country`, then `x-vercel-ip-country`)
//! - `cdn`: CDN geo header (`cf-ipcountry`)
//! - `ip`: first `x-forwarded-for` entry, else `x-real-ip`, else the peer address, looked up in the local [`GeoTable`]
//! - `default`: `DEFAULT_COUNTRY`
use std::{net::IpAddr, str::FromStr};

use axum::http::HeaderMap;
use thiserror::Error;

use crate::{
    geo::{GeoTable, country_code},
    models::UNKNOWN_COUNTRY,
};

pub const PLATFORM_HEADERS: [&str; 2] = ["x-geo-country", "x-vercel-ip-country"];
pub const CDN_HEADERS: [&str; 1] = ["cf-ipcountry"];
pub const FORWARDED_FOR: &str = "x-forwarded-for";
pub const REAL_IP: &str = "x-real-ip";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    Platform,
    Cdn,
    ForwardedIp,
    Default,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum OrderError {
    #[error("Unknown resolution strategy: {0}")]
    Unknown(String),

    #[error("Resolution strategy listed twice: {0}")]
    Duplicate(String),

    #[error("Resolution order is empty")]
    Empty,
}

impl FromStr for Strategy {
    type Err = OrderError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "platform" => Ok(Strategy::Platform),
            "cdn" => Ok(Strategy::Cdn),
            "ip" => Ok(Strategy::ForwardedIp),
            "default" => Ok(Strategy::Default),
            _ => Err(OrderError::Unknown(name.trim().to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolutionOrder(Vec<Strategy>);

impl ResolutionOrder {
    pub fn strategies(&self) -> &[Strategy] {
        &self.0
    }
}

impl Default for ResolutionOrder {
    fn default() -> Self {
        Self(vec![
            Strategy::Platform,
            Strategy::Cdn,
            Strategy::ForwardedIp,
            Strategy::Default,
        ])
    }
}

impl FromStr for ResolutionOrder {
    type Err = OrderError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut strategies = Vec::new();

        for name in raw.split(',').filter(|name| !name.trim().is_empty()) {
            let strategy: Strategy = name.parse()?;

            if strategies.contains(&strategy) {
                return Err(OrderError::Duplicate(name.trim().to_string()));
            }
            strategies.push(strategy);
        }

        if strategies.is_empty() {
            return Err(OrderError::Empty);
        }

        Ok(Self(strategies))
    }
}

/// What a vote request tells us about where it came from.
pub struct RequestMeta<'a> {
    pub headers: &'a HeaderMap,
    pub peer: Option<IpAddr>,
}

impl<'a> RequestMeta<'a> {
    pub fn new(headers: &'a HeaderMap, peer: Option<IpAddr>) -> Self {
        Self { headers, peer }
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// First valid country code among `names`.
    fn geo_header(&self, names: &[&str]) -> Option<String> {
        names
            .iter()
            .find_map(|name| self.header(name).and_then(country_code))
    }

    /// Client address as reported by proxies, else the socket peer.
    pub fn client_ip(&self) -> Option<IpAddr> {
        let forwarded = self
            .header(FORWARDED_FOR)
            .and_then(|chain| chain.split(',').next())
            .and_then(|first| first.trim().parse().ok());

        forwarded
            .or_else(|| self.header(REAL_IP).and_then(|ip| ip.trim().parse().ok()))
            .or(self.peer)
    }
}

pub struct CountryResolver {
    order: ResolutionOrder,
    default_country: Option<String>,
    geo: GeoTable,
}

impl CountryResolver {
    pub fn new(order: ResolutionOrder, default_country: Option<String>, geo: GeoTable) -> Self {
        Self {
            order,
            default_country: default_country.as_deref().and_then(country_code),
            geo,
        }
    }

    fn try_strategy(&self, strategy: Strategy, meta: &RequestMeta) -> Option<String> {
        match strategy {
            Strategy::Platform => meta.geo_header(&PLATFORM_HEADERS),
            Strategy::Cdn => meta.geo_header(&CDN_HEADERS),
            Strategy::ForwardedIp => meta.client_ip().and_then(|ip| self.geo.lookup(ip)),
            Strategy::Default => self.default_country.clone(),
        }
    }

    pub fn resolve(&self, meta: &RequestMeta) -> String {
        self.order
            .strategies()
            .iter()
            .find_map(|&strategy| self.try_strategy(strategy, meta))
            .unwrap_or_else(|| UNKNOWN_COUNTRY.to_string())
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    const TABLE: &str = "192.0.2.0,192.0.2.255,JP\n198.51.100.0,198.51.100.255,BR\n";

    fn resolver(order: &str, default_country: Option<&str>) -> CountryResolver {
        CountryResolver::new(
            order.parse().unwrap(),
            default_country.map(str::to_string),
            GeoTable::from_reader(TABLE.as_bytes()).unwrap(),
        )
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_static(*value));
        }
        headers
    }

    fn resolve(resolver: &CountryResolver, headers: &HeaderMap, peer: Option<&str>) -> String {
        let peer = peer.map(|ip| ip.parse().unwrap());
        resolver.resolve(&RequestMeta::new(headers, peer))
    }

    #[test]
    fn test_platform_header_wins() {
        let resolver = resolver("platform,cdn,ip,default", Some("IN"));
        let headers = headers(&[("x-vercel-ip-country", "fr"), ("cf-ipcountry", "DE")]);

        assert_eq!(resolve(&resolver, &headers, None), "FR");
    }

    #[test]
    fn test_platform_headers_in_order() {
        let resolver = resolver("platform", None);
        let both = headers(&[("x-geo-country", "FR"), ("x-vercel-ip-country", "DE")]);
        let vercel_only = headers(&[("x-vercel-ip-country", "DE")]);
        let bad_geo = headers(&[("x-geo-country", "XX"), ("x-vercel-ip-country", "de")]);

        assert_eq!(resolve(&resolver, &both, None), "FR");
        assert_eq!(resolve(&resolver, &vercel_only, None), "DE");
        assert_eq!(resolve(&resolver, &bad_geo, None), "DE");
    }

    #[test]
    fn test_cdn_header_next() {
        let resolver = resolver("platform,cdn,ip,default", Some("IN"));
        let headers = headers(&[("cf-ipcountry", "de"), (FORWARDED_FOR, "192.0.2.1")]);

        assert_eq!(resolve(&resolver, &headers, None), "DE");
    }

    #[test]
    fn test_forwarded_chain_uses_first_entry() {
        let resolver = resolver("platform,cdn,ip,default", Some("IN"));
        let headers = headers(&[(FORWARDED_FOR, " 198.51.100.7 , 192.0.2.1")]);

        assert_eq!(resolve(&resolver, &headers, Some("192.0.2.1")), "BR");
    }

    #[test]
    fn test_real_ip_then_peer() {
        let resolver = resolver("ip", None);

        let real_ip = headers(&[(REAL_IP, "192.0.2.9")]);
        assert_eq!(resolve(&resolver, &real_ip, Some("198.51.100.1")), "JP");

        assert_eq!(resolve(&resolver, &HeaderMap::new(), Some("198.51.100.1")), "BR");
    }

    #[test]
    fn test_unknown_ip_falls_to_default() {
        let resolver = resolver("platform,cdn,ip,default", Some(" in "));
        let headers = headers(&[(FORWARDED_FOR, "8.8.8.8")]);

        assert_eq!(resolve(&resolver, &headers, None), "IN");
    }

    #[test]
    fn test_nothing_resolves_to_sentinel() {
        let resolver = resolver("platform,cdn,ip,default", None);

        assert_eq!(resolve(&resolver, &HeaderMap::new(), None), UNKNOWN_COUNTRY);
    }

    #[test]
    fn test_malformed_headers_advance() {
        let resolver = resolver("platform,cdn,default", Some("IN"));
        let headers = headers(&[("x-geo-country", "France"), ("cf-ipcountry", "XX")]);

        assert_eq!(resolve(&resolver, &headers, None), "IN");
    }

    #[test]
    fn test_configured_order() {
        let resolver = resolver("default,platform", Some("IN"));
        let headers = headers(&[("x-geo-country", "FR")]);

        assert_eq!(resolve(&resolver, &headers, None), "IN");
    }

    #[test]
    fn test_order_parsing() {
        assert_eq!("ip, cdn".parse::<ResolutionOrder>().unwrap().strategies(), [
            Strategy::ForwardedIp,
            Strategy::Cdn
        ]);
        assert_eq!(
            "ip,geo".parse::<ResolutionOrder>(),
            Err(OrderError::Unknown("geo".into()))
        );
        assert_eq!(
            "cdn,CDN".parse::<ResolutionOrder>(),
            Err(OrderError::Duplicate("CDN".into()))
        );
        assert_eq!(" , ".parse::<ResolutionOrder>(), Err(OrderError::Empty));
    }
}
