//! DNS allow/deny-list lookups and private-range classification.

use tokio::net::lookup_host;

/// Outcome of a positive allow/deny-list lookup, kept on the session for
/// logging and message annotation.
#[derive(Debug, Clone)]
pub struct DnsListing {
    /// "white" or "black".
    pub list_type: &'static str,
    /// Provider domain that flagged the IP.
    pub list_name: String,
    /// Address(es) returned by the provider, joined with '+'.
    pub list_value: String,
}

/// True when the IPv4 dotted-quad falls into a private/reserved range.
/// See RFC-1918, RFC-3330, RFC-3927.
pub fn is_private_ip(ip: &str) -> bool {
    // 127/8, 10/8, 192.168/16, 169.254/16, 192.0.2/24
    if ip.starts_with("127.")
        || ip.starts_with("10.")
        || ip.starts_with("192.168.")
        || ip.starts_with("169.254.")
        || ip.starts_with("192.0.2.")
    {
        return true;
    }

    // 172.16/12
    let octets: Vec<&str> = ip.splitn(4, '.').collect();
    if octets.len() == 4 && octets[0] == "172" {
        if let Ok(octet) = octets[1].parse::<u8>() {
            return (16..=31).contains(&octet);
        }
    }

    false
}

/// Reverses the four IPv4 octets and appends the provider domain.
pub fn build_dns_list_query(ip: &str, domain: &str) -> String {
    let octets: Vec<&str> = ip.splitn(4, '.').collect();
    if octets.len() != 4 {
        return format!("{}.{}", ip, domain);
    }
    format!("{}.{}.{}.{}.{}", octets[3], octets[2], octets[1], octets[0], domain)
}

/// Checks an IPv4 against the given list providers; the first hit wins.
/// Resolution failures count as "not listed" for that provider.
pub async fn check_lists(ip: &str, lists: &[String], list_type: &'static str) -> Option<DnsListing> {
    for list in lists {
        let query = build_dns_list_query(ip, list);
        if let Some(value) = query_dns(&query).await {
            return Some(DnsListing {
                list_type,
                list_name: list.clone(),
                list_value: value,
            });
        }
    }
    None
}

// any successful resolution (one or more addresses) counts as a hit
async fn query_dns(query: &str) -> Option<String> {
    match lookup_host((query, 0)).await {
        Ok(addrs) => {
            let found: Vec<String> = addrs.map(|a| a.ip().to_string()).collect();
            if found.is_empty() {
                None
            } else {
                Some(found.join("+"))
            }
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_ranges() {
        assert!(is_private_ip("127.0.0.1"));
        assert!(is_private_ip("10.1.2.3"));
        assert!(is_private_ip("192.168.0.44"));
        assert!(is_private_ip("169.254.9.9"));
        assert!(is_private_ip("192.0.2.200"));
        assert!(is_private_ip("172.16.0.1"));
        assert!(is_private_ip("172.31.255.255"));
    }

    #[test]
    fn public_ranges() {
        assert!(!is_private_ip("8.8.8.8"));
        assert!(!is_private_ip("172.15.0.1"));
        assert!(!is_private_ip("172.32.0.1"));
        assert!(!is_private_ip("193.0.2.1"));
    }

    #[test]
    fn reversed_query() {
        assert_eq!(
            build_dns_list_query("1.2.3.4", "zen.example.net"),
            "4.3.2.1.zen.example.net"
        );
    }

    #[tokio::test]
    async fn empty_provider_list_is_no_match() {
        assert!(check_lists("198.51.100.7", &[], "black").await.is_none());
    }
}
