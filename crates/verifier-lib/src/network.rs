//! Private address ranges and size units
//!
//! Workload networks must live in one of the RFC1918 blocks, and disk sizes
//! reported back by the grid are in bytes while requests are in GiB.

use crate::naming::NameGenerator;
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// Bytes in one GiB, the unit the grid uses for disk and rootfs sizes
pub const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

/// RFC1918 private blocks (class A, B and C)
const PRIVATE_BLOCKS: [(Ipv4Addr, u8); 3] = [
    (Ipv4Addr::new(10, 0, 0, 0), 8),
    (Ipv4Addr::new(172, 16, 0, 0), 12),
    (Ipv4Addr::new(192, 168, 0, 0), 16),
];

/// Convert GiB to bytes
pub fn gb_to_bytes(gb: u64) -> u64 {
    gb.saturating_mul(BYTES_PER_GB)
}

/// Convert bytes back to whole GiB, `None` if the value is not an exact multiple
pub fn bytes_to_gb(bytes: u64) -> Option<u64> {
    if bytes % BYTES_PER_GB == 0 {
        Some(bytes / BYTES_PER_GB)
    } else {
        None
    }
}

/// Whether the whole range sits inside one RFC1918 block
pub fn is_private_range(range: &Ipv4Net) -> bool {
    PRIVATE_BLOCKS.iter().any(|(addr, len)| {
        Ipv4Net::new(*addr, *len)
            .map(|block| block.contains(range))
            .unwrap_or(false)
    })
}

/// Whether `ip` is a private address inside `range`
pub fn is_private_member(range: &Ipv4Net, ip: Ipv4Addr) -> bool {
    ip.is_private() && range.contains(&ip)
}

/// Pick a random /16 from one of the three private classes:
/// `10.<1..=255>.0.0/16`, `172.<16..=31>.0.0/16` or `192.168.0.0/16`
pub fn random_private_range(names: &dyn NameGenerator) -> Ipv4Net {
    let addr = match names.index(3) {
        0 => Ipv4Addr::new(10, names.int_in(1, 255) as u8, 0, 0),
        1 => Ipv4Addr::new(172, names.int_in(16, 31) as u8, 0, 0),
        _ => Ipv4Addr::new(192, 168, 0, 0),
    };
    // /16 is always a valid IPv4 prefix length
    Ipv4Net::new(addr, 16).unwrap_or_else(|_| Ipv4Net::from(addr))
}
