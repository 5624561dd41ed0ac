use std::collections::{BTreeMap, HashMap};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub auth_url: String,
    pub registry_url: String,
    pub function_url: String,
    pub backend_a_nodes: BTreeMap<String, String>,
    pub backend_b_nodes: BTreeMap<String, String>,
    pub rpc_timeout_ms: u64,
    pub primary_timeout_ms: u64,
    pub hook_timeout_ms: u64,
    pub cache_max_entries: usize,
    pub cache_max_entry_bytes: usize,
    pub cache_list_ttl_ms: u64,
    pub cache_aggregation_ttl_ms: u64,
    pub registry_cache_ttl_ms: u64,
    pub history_workers: usize,
    pub history_queue_warn: usize,
    pub history_write_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for StartupError {}

impl GatewayConfig {
    pub fn load() -> Result<Self, StartupError> {
        let mut merged = HashMap::new();

        if let Ok(config_path) = std::env::var("BUILDER_CONFIG_PATH") {
            let config_path = config_path.trim();
            if !config_path.is_empty() {
                let file_kv = parse_env_file(config_path)?;
                merged.extend(file_kv);
            }
        }

        merged.extend(std::env::vars());

        Self::from_kv(&merged)
    }

    pub fn from_kv(kv: &HashMap<String, String>) -> Result<Self, StartupError> {
        let bind_addr = parse_socket_addr(
            kv.get("BUILDER_BIND_ADDR"),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080),
            "BUILDER_BIND_ADDR",
        )?;

        let auth_url = require_nonempty(kv, "BUILDER_AUTH_URL")?;
        let registry_url = require_nonempty(kv, "BUILDER_REGISTRY_URL")?;
        let function_url = require_nonempty(kv, "BUILDER_FUNCTION_URL")?;

        let backend_a_nodes = parse_node_map(
            Some(&require_nonempty(kv, "BUILDER_BACKEND_A_NODES")?),
            "BUILDER_BACKEND_A_NODES",
        )?;
        if backend_a_nodes.is_empty() {
            return Err(StartupError {
                code: "ERR_INVALID_CONFIG",
                message: "BUILDER_BACKEND_A_NODES must name at least one node".to_string(),
            });
        }
        let backend_b_nodes =
            parse_node_map(kv.get("BUILDER_BACKEND_B_NODES"), "BUILDER_BACKEND_B_NODES")?;

        let rpc_timeout_ms = parse_u64(kv.get("BUILDER_RPC_TIMEOUT_MS"), 5000, "BUILDER_RPC_TIMEOUT_MS")?;
        let primary_timeout_ms = parse_u64(
            kv.get("BUILDER_PRIMARY_TIMEOUT_MS"),
            15_000,
            "BUILDER_PRIMARY_TIMEOUT_MS",
        )?;
        if primary_timeout_ms == 0 {
            return Err(StartupError {
                code: "ERR_INVALID_CONFIG",
                message: "BUILDER_PRIMARY_TIMEOUT_MS must be >= 1".to_string(),
            });
        }
        let hook_timeout_ms = parse_u64(
            kv.get("BUILDER_HOOK_TIMEOUT_MS"),
            15_000,
            "BUILDER_HOOK_TIMEOUT_MS",
        )?;

        let cache_max_entries = parse_usize(
            kv.get("BUILDER_CACHE_MAX_ENTRIES"),
            10_000,
            "BUILDER_CACHE_MAX_ENTRIES",
        )?;
        let cache_max_entry_bytes = parse_usize(
            kv.get("BUILDER_CACHE_MAX_ENTRY_BYTES"),
            1024 * 1024,
            "BUILDER_CACHE_MAX_ENTRY_BYTES",
        )?;
        let cache_list_ttl_ms = parse_u64(
            kv.get("BUILDER_CACHE_LIST_TTL_MS"),
            15_000,
            "BUILDER_CACHE_LIST_TTL_MS",
        )?;
        let cache_aggregation_ttl_ms = parse_u64(
            kv.get("BUILDER_CACHE_AGGREGATION_TTL_MS"),
            15_000,
            "BUILDER_CACHE_AGGREGATION_TTL_MS",
        )?;

        let registry_cache_ttl_ms = parse_u64(
            kv.get("BUILDER_REGISTRY_CACHE_TTL_MS"),
            60_000,
            "BUILDER_REGISTRY_CACHE_TTL_MS",
        )?;

        let history_workers = parse_usize(
            kv.get("BUILDER_HISTORY_WORKERS"),
            16,
            "BUILDER_HISTORY_WORKERS",
        )?;
        if history_workers == 0 {
            return Err(StartupError {
                code: "ERR_INVALID_CONFIG",
                message: "BUILDER_HISTORY_WORKERS must be >= 1".to_string(),
            });
        }
        let history_queue_warn = parse_usize(
            kv.get("BUILDER_HISTORY_QUEUE_WARN"),
            1024,
            "BUILDER_HISTORY_QUEUE_WARN",
        )?;
        let history_write_timeout_ms = parse_u64(
            kv.get("BUILDER_HISTORY_WRITE_TIMEOUT_MS"),
            10_000,
            "BUILDER_HISTORY_WRITE_TIMEOUT_MS",
        )?;

        Ok(Self {
            bind_addr,
            auth_url,
            registry_url,
            function_url,
            backend_a_nodes,
            backend_b_nodes,
            rpc_timeout_ms,
            primary_timeout_ms,
            hook_timeout_ms,
            cache_max_entries,
            cache_max_entry_bytes,
            cache_list_ttl_ms,
            cache_aggregation_ttl_ms,
            registry_cache_ttl_ms,
            history_workers,
            history_queue_warn,
            history_write_timeout_ms,
        })
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn primary_timeout(&self) -> Duration {
        Duration::from_millis(self.primary_timeout_ms)
    }

    pub fn hook_timeout(&self) -> Duration {
        Duration::from_millis(self.hook_timeout_ms)
    }

    pub fn cache_list_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_list_ttl_ms)
    }

    pub fn cache_aggregation_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_aggregation_ttl_ms)
    }

    pub fn registry_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.registry_cache_ttl_ms)
    }

    pub fn history_write_timeout(&self) -> Duration {
        Duration::from_millis(self.history_write_timeout_ms)
    }
}

fn parse_env_file(path: &str) -> Result<HashMap<String, String>, StartupError> {
    let contents = std::fs::read_to_string(path).map_err(|_| StartupError {
        code: "ERR_CONFIG_FILE_READ",
        message: format!("failed to read config file at {}", path),
    })?;

    let mut kv = HashMap::new();

    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| StartupError {
            code: "ERR_CONFIG_FILE_PARSE",
            message: format!("invalid config line {} (expected KEY=VALUE)", idx + 1),
        })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(StartupError {
                code: "ERR_CONFIG_FILE_PARSE",
                message: format!("invalid config line {} (empty key)", idx + 1),
            });
        }

        kv.insert(key.to_string(), strip_quotes(value.trim()));
    }

    Ok(kv)
}

fn strip_quotes(s: &str) -> String {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return s[1..bytes.len() - 1].to_string();
        }
    }
    s.to_string()
}

fn require_nonempty(
    kv: &HashMap<String, String>,
    key: &'static str,
) -> Result<String, StartupError> {
    let value = kv.get(key).map(|v| v.trim()).unwrap_or("");
    if value.is_empty() {
        return Err(StartupError {
            code: "ERR_MISSING_CONFIG",
            message: format!("missing required config key {}", key),
        });
    }

    Ok(value.to_string())
}

/// Parses `node=url,node=url`.
fn parse_node_map(
    value: Option<&String>,
    key: &'static str,
) -> Result<BTreeMap<String, String>, StartupError> {
    let mut nodes = BTreeMap::new();
    let Some(raw) = value else {
        return Ok(nodes);
    };

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (node, url) = entry.split_once('=').ok_or_else(|| StartupError {
            code: "ERR_INVALID_CONFIG",
            message: format!("{} entries must look like node=url", key),
        })?;
        let (node, url) = (node.trim(), url.trim());
        if node.is_empty() || url.is_empty() {
            return Err(StartupError {
                code: "ERR_INVALID_CONFIG",
                message: format!("{} entries must look like node=url", key),
            });
        }
        if nodes.insert(node.to_string(), url.to_string()).is_some() {
            return Err(StartupError {
                code: "ERR_INVALID_CONFIG",
                message: format!("{} names node {} twice", key, node),
            });
        }
    }

    Ok(nodes)
}

fn parse_socket_addr(
    value: Option<&String>,
    default: SocketAddr,
    key: &'static str,
) -> Result<SocketAddr, StartupError> {
    match value {
        None => Ok(default),
        Some(v) => v.trim().parse::<SocketAddr>().map_err(|_| StartupError {
            code: "ERR_INVALID_CONFIG",
            message: format!("{} must be a valid host:port socket address", key),
        }),
    }
}

fn parse_usize(
    value: Option<&String>,
    default: usize,
    key: &'static str,
) -> Result<usize, StartupError> {
    match value {
        None => Ok(default),
        Some(v) if v.trim().is_empty() => Ok(default),
        Some(v) => v.trim().parse::<usize>().map_err(|_| StartupError {
            code: "ERR_INVALID_CONFIG",
            message: format!("{} must be an integer", key),
        }),
    }
}

fn parse_u64(value: Option<&String>, default: u64, key: &'static str) -> Result<u64, StartupError> {
    match value {
        None => Ok(default),
        Some(v) if v.trim().is_empty() => Ok(default),
        Some(v) => v.trim().parse::<u64>().map_err(|_| StartupError {
            code: "ERR_INVALID_CONFIG",
            message: format!("{} must be an integer", key),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_ok_env() -> HashMap<String, String> {
        HashMap::from([
            (
                "BUILDER_AUTH_URL".to_string(),
                "http://localhost:9101".to_string(),
            ),
            (
                "BUILDER_REGISTRY_URL".to_string(),
                "http://localhost:9102".to_string(),
            ),
            (
                "BUILDER_FUNCTION_URL".to_string(),
                "http://localhost:9103".to_string(),
            ),
            (
                "BUILDER_BACKEND_A_NODES".to_string(),
                "default=http://localhost:9201".to_string(),
            ),
        ])
    }

    #[test]
    fn defaults_apply_to_minimal_env() {
        let cfg = GatewayConfig::from_kv(&minimal_ok_env()).expect("config should parse");
        assert_eq!(cfg.bind_addr.port(), 8080);
        assert_eq!(cfg.primary_timeout(), Duration::from_secs(15));
        assert_eq!(cfg.cache_list_ttl(), Duration::from_secs(15));
        assert_eq!(cfg.cache_aggregation_ttl(), Duration::from_secs(15));
        assert!(cfg.backend_b_nodes.is_empty());
        assert_eq!(
            cfg.backend_a_nodes.get("default").map(String::as_str),
            Some("http://localhost:9201")
        );
    }

    #[test]
    fn cache_ttls_are_independent() {
        let mut env = minimal_ok_env();
        env.insert("BUILDER_CACHE_LIST_TTL_MS".to_string(), "5000".to_string());
        env.insert(
            "BUILDER_CACHE_AGGREGATION_TTL_MS".to_string(),
            "60000".to_string(),
        );
        let cfg = GatewayConfig::from_kv(&env).unwrap();
        assert_eq!(cfg.cache_list_ttl(), Duration::from_secs(5));
        assert_eq!(cfg.cache_aggregation_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn missing_backend_nodes_fail() {
        let mut env = minimal_ok_env();
        env.remove("BUILDER_BACKEND_A_NODES");
        let err = GatewayConfig::from_kv(&env).unwrap_err();
        assert_eq!(err.code, "ERR_MISSING_CONFIG");
    }

    #[test]
    fn malformed_node_map_fails() {
        let mut env = minimal_ok_env();
        env.insert(
            "BUILDER_BACKEND_B_NODES".to_string(),
            "pg1=http://a,pg1=http://b".to_string(),
        );
        let err = GatewayConfig::from_kv(&env).unwrap_err();
        assert_eq!(err.code, "ERR_INVALID_CONFIG");

        env.insert("BUILDER_BACKEND_B_NODES".to_string(), "no-equals".to_string());
        let err = GatewayConfig::from_kv(&env).unwrap_err();
        assert_eq!(err.code, "ERR_INVALID_CONFIG");
    }

    #[test]
    fn zero_history_workers_fail() {
        let mut env = minimal_ok_env();
        env.insert("BUILDER_HISTORY_WORKERS".to_string(), "0".to_string());
        assert_eq!(
            GatewayConfig::from_kv(&env).unwrap_err().code,
            "ERR_INVALID_CONFIG"
        );
    }
}
