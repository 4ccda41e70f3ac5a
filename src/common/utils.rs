//! Utility functions for repfs

use std::net::{IpAddr, UdpSocket};

/// Get current Unix timestamp (milliseconds)
pub fn timestamp_now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

/// Parse duration string (e.g., "500ms", "30s", "5m", "1h")
pub fn parse_duration(s: &str) -> crate::Result<std::time::Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(crate::Error::InvalidConfig("empty duration".into()));
    }

    let (num_str, unit) = if s.ends_with("ms") {
        (&s[..s.len() - 2], "ms")
    } else {
        (&s[..s.len() - 1], &s[s.len() - 1..])
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| crate::Error::InvalidConfig(format!("invalid duration: {}", s)))?;

    let duration = match unit {
        "ms" => std::time::Duration::from_millis(num),
        "s" => std::time::Duration::from_secs(num),
        "m" => std::time::Duration::from_secs(num * 60),
        "h" => std::time::Duration::from_secs(num * 3600),
        _ => {
            return Err(crate::Error::InvalidConfig(format!(
                "unknown duration unit: {}",
                unit
            )))
        }
    };

    Ok(duration)
}

/// Validate a client-supplied file name before it touches the filesystem.
/// Names are flat: no separators, no traversal, no control characters.
pub fn validate_file_name(name: &str) -> crate::Result<()> {
    if name.is_empty() {
        return Err(crate::Error::InvalidFileName("empty name".into()));
    }
    if name.len() > 512 {
        return Err(crate::Error::InvalidFileName(format!(
            "{}... (max 512 bytes)",
            &name[..32]
        )));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(crate::Error::InvalidFileName(name.to_string()));
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(crate::Error::InvalidFileName(name.to_string()));
    }
    Ok(())
}

/// Determine this host's externally reachable address.
///
/// Connecting a UDP socket never sends a packet; it only asks the kernel
/// which local interface routes toward the target.
pub fn lan_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|a| a.ip())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(
            parse_duration("500ms").unwrap(),
            std::time::Duration::from_millis(500)
        );
        assert_eq!(
            parse_duration("30s").unwrap(),
            std::time::Duration::from_secs(30)
        );
        assert_eq!(
            parse_duration("5m").unwrap(),
            std::time::Duration::from_secs(300)
        );
        assert_eq!(
            parse_duration("1h").unwrap(),
            std::time::Duration::from_secs(3600)
        );
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
    }

    #[test]
    fn test_validate_file_name() {
        assert!(validate_file_name("a.txt").is_ok());
        assert!(validate_file_name("report-2024.bin").is_ok());
        assert!(validate_file_name("").is_err());
        assert!(validate_file_name("dir/a.txt").is_err());
        assert!(validate_file_name("..\\a.txt").is_err());
        assert!(validate_file_name("../etc/passwd").is_err());
        assert!(validate_file_name(&"x".repeat(600)).is_err());
    }

    #[test]
    fn test_timestamp_monotone_enough() {
        let a = timestamp_now_millis();
        let b = timestamp_now_millis();
        assert!(b >= a);
    }
}
