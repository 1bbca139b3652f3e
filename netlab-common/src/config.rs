//! Parsers for the three plain-text config file formats (spec.md §6
//! "Files"): the router's `forwarding_table.txt`, the blaster's
//! `blaster_params.txt`, and the middlebox's `middlebox_params.txt`.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

/// One line of `forwarding_table.txt`: `prefix mask next_hop ifname`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticRoute {
    pub prefix: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub next_hop: Ipv4Addr,
    pub ifname: String,
}

/// Loads `forwarding_table.txt`. Unreadable files and malformed lines are
/// skipped, not fatal — the router just runs with local routes only
/// (spec.md §7(b): malformed input is silently dropped).
pub fn load_forwarding_table(path: impl AsRef<Path>) -> Vec<StaticRoute> {
    let path = path.as_ref();
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            log::debug!("no forwarding table at {path:?}: {e}");
            return Vec::new();
        }
    };

    let mut routes = Vec::new();
    for line in contents.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 4 {
            continue;
        }
        let (Ok(prefix), Ok(mask), Ok(next_hop)) = (
            fields[0].parse::<Ipv4Addr>(),
            fields[1].parse::<Ipv4Addr>(),
            fields[2].parse::<Ipv4Addr>(),
        ) else {
            log::debug!("skipping malformed forwarding table line: {line}");
            continue;
        };
        routes.push(StaticRoute {
            prefix,
            mask,
            next_hop,
            ifname: fields[3].to_string(),
        });
    }
    routes
}

fn parse_key_value_line(contents: &str, expected_tokens: usize, valid_keys: &[&str], path: &Path) -> Result<HashMap<String, String>> {
    let fields: Vec<&str> = contents.split_whitespace().collect();
    if fields.len() != expected_tokens {
        bail!(
            "{path:?} must contain exactly {expected_tokens} whitespace-separated tokens, found {}",
            fields.len()
        );
    }
    let mut seen = HashMap::new();
    for pair in fields.chunks(2) {
        let key = pair[0];
        if !valid_keys.contains(&key) {
            bail!("unknown parameter {key} in {path:?}");
        }
        seen.insert(key.to_string(), pair[1].to_string());
    }
    if seen.len() != valid_keys.len() {
        bail!(
            "{path:?} must set every one of {valid_keys:?} exactly once, got {:?}",
            seen.keys().collect::<Vec<_>>()
        );
    }
    Ok(seen)
}

/// The blaster's 7 required `-k v` parameters (spec.md §4.7).
#[derive(Debug, Clone, PartialEq)]
pub struct BlasterParams {
    pub blastee_ip: Ipv4Addr,
    pub total_packets: u32,
    pub length_per_blast: u16,
    pub window_size: u32,
    pub est_rtt_ms: f64,
    pub recv_timeout_ms: u64,
    pub ewma_alpha: f64,
}

const BLASTER_KEYS: &[&str] = &["-b", "-n", "-l", "-w", "-rtt", "-r", "-alpha"];

impl BlasterParams {
    /// Missing/malformed params files are fatal at startup (spec.md §7(c)).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading blaster params file {path:?}"))?;
        let seen = parse_key_value_line(&contents, 14, BLASTER_KEYS, path)?;
        let get = |key: &str| -> &str { seen.get(key).expect("validated above") };
        Ok(BlasterParams {
            blastee_ip: get("-b").parse().context("-b")?,
            total_packets: get("-n").parse().context("-n")?,
            length_per_blast: get("-l").parse().context("-l")?,
            window_size: get("-w").parse().context("-w")?,
            est_rtt_ms: get("-rtt").parse().context("-rtt")?,
            recv_timeout_ms: get("-r").parse().context("-r")?,
            ewma_alpha: get("-alpha").parse().context("-alpha")?,
        })
    }
}

/// The middlebox's 4 required `-k v` parameters (spec.md §4.9).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MiddleboxParams {
    pub seed: u64,
    pub drop_percent: u8,
    pub delay_mean_ms: f64,
    pub delay_std_ms: f64,
}

const MIDDLEBOX_KEYS: &[&str] = &["-s", "-p", "-dm", "-dstd"];

impl MiddleboxParams {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading middlebox params file {path:?}"))?;
        let seen = parse_key_value_line(&contents, 8, MIDDLEBOX_KEYS, path)?;
        let get = |key: &str| -> &str { seen.get(key).expect("validated above") };
        Ok(MiddleboxParams {
            seed: get("-s").parse().context("-s")?,
            drop_percent: get("-p").parse().context("-p")?,
            delay_mean_ms: get("-dm").parse().context("-dm")?,
            delay_std_ms: get("-dstd").parse().context("-dstd")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile_like::TempPath {
        tempfile_like::TempPath::with_contents(contents)
    }

    /// Tiny stand-in for a temp-file helper so this module doesn't reach for
    /// an extra dev-dependency just to write one string to disk.
    mod tempfile_like {
        use std::fs;
        use std::path::{Path, PathBuf};
        use std::sync::atomic::{AtomicU64, Ordering};

        static COUNTER: AtomicU64 = AtomicU64::new(0);

        pub struct TempPath(PathBuf);

        impl TempPath {
            pub fn with_contents(contents: &str) -> Self {
                let n = COUNTER.fetch_add(1, Ordering::SeqCst);
                let path = std::env::temp_dir().join(format!("netlab-config-test-{}-{n}", std::process::id()));
                fs::write(&path, contents).expect("write temp config file");
                TempPath(path)
            }
        }

        impl AsRef<Path> for TempPath {
            fn as_ref(&self) -> &Path {
                &self.0
            }
        }

        impl Drop for TempPath {
            fn drop(&mut self) {
                let _ = fs::remove_file(&self.0);
            }
        }
    }

    #[test]
    fn forwarding_table_skips_malformed_lines() {
        let path = write_temp(
            "172.16.0.0 255.255.0.0 10.10.1.254 eth1\nbad line here\n192.168.1.0 255.255.255.0 192.168.1.1 eth0\n",
        );
        let routes = load_forwarding_table(&path);
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].ifname, "eth1");
        assert_eq!(routes[1].prefix, Ipv4Addr::new(192, 168, 1, 0));
    }

    #[test]
    fn forwarding_table_missing_file_is_empty_not_fatal() {
        let routes = load_forwarding_table("/no/such/file/netlab-test");
        assert!(routes.is_empty());
    }

    #[test]
    fn blaster_params_parse_all_seven_keys() {
        let path = write_temp(
            "-b 192.168.100.1 -n 5 -l 8 -w 2 -rtt 100 -r 100 -alpha 0.5\n",
        );
        let params = BlasterParams::load(&path).unwrap();
        assert_eq!(params.blastee_ip, Ipv4Addr::new(192, 168, 100, 1));
        assert_eq!(params.total_packets, 5);
        assert_eq!(params.window_size, 2);
        assert!((params.ewma_alpha - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn blaster_params_rejects_unknown_key() {
        let path = write_temp(
            "-b 192.168.100.1 -n 5 -l 8 -w 2 -rtt 100 -r 100 -bogus 1\n",
        );
        assert!(BlasterParams::load(&path).is_err());
    }

    #[test]
    fn middlebox_params_parse_all_four_keys() {
        let path = write_temp("-s 42 -p 0 -dm 0 -dstd 0\n");
        let params = MiddleboxParams::load(&path).unwrap();
        assert_eq!(params.seed, 42);
        assert_eq!(params.drop_percent, 0);
    }
}
