use std::env;

/// One century.
const MAX_FILE_EXPIRY_HOURS: i64 = 100 * 365 * 24;

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    pub cors_allow_any: bool,
    pub cors_origins: Vec<String>,
    pub api_key: String,
    pub tts_base_url: String,
    pub tts_timeout_ms: u64,
    pub output_dir: String,
    pub file_expiry_hours: i64,
    pub rate_limit_per_minute: u32,
    pub rate_limit_burst: u32,
    pub rate_limit_sweep_secs: u64,
    pub trust_forwarded_for: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source; `from_env` passes
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = value_or(&lookup, "BIND_ADDR", "0.0.0.0:8000");
        let cors_raw = value_or(&lookup, "CORS_ORIGINS", "http://localhost:5173");
        let (cors_allow_any, cors_origins) = parse_cors_origins(&cors_raw);
        let api_key = lookup("GOOGLE_CLOUD_API_KEY")
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("GOOGLE_CLOUD_API_KEY is required"))?;
        let tts_base_url = value_or(
            &lookup,
            "TTS_BASE_URL",
            "https://texttospeech.googleapis.com/v1",
        );
        let tts_timeout_ms = value_or_parse(&lookup, "TTS_TIMEOUT_MS", 30_000)?;
        let output_dir = value_or(&lookup, "OUTPUT_DIR", "output");
        let file_expiry_hours = value_or_parse(&lookup, "FILE_EXPIRY_HOURS", 24)?;
        let rate_limit_per_minute = value_or_parse(&lookup, "RATE_LIMIT_PER_MINUTE", 60)?;
        let rate_limit_burst = value_or_parse(&lookup, "RATE_LIMIT_BURST", 100)?;
        let rate_limit_sweep_secs = value_or_parse(&lookup, "RATE_LIMIT_SWEEP_SECS", 60)?;
        let trust_forwarded_for = value_or_parse(&lookup, "TRUST_FORWARDED_FOR", false)?;

        if tts_timeout_ms == 0 {
            return Err(anyhow::anyhow!("TTS_TIMEOUT_MS must be > 0"));
        }
        if !(1..=MAX_FILE_EXPIRY_HOURS).contains(&file_expiry_hours) {
            return Err(anyhow::anyhow!(
                "FILE_EXPIRY_HOURS must be between 1 and {MAX_FILE_EXPIRY_HOURS}"
            ));
        }
        if rate_limit_sweep_secs == 0 {
            return Err(anyhow::anyhow!("RATE_LIMIT_SWEEP_SECS must be > 0"));
        }

        Ok(Self {
            bind_addr,
            cors_allow_any,
            cors_origins,
            api_key,
            tts_base_url,
            tts_timeout_ms,
            output_dir,
            file_expiry_hours,
            rate_limit_per_minute,
            rate_limit_burst,
            rate_limit_sweep_secs,
            trust_forwarded_for,
        })
    }

    #[cfg(test)]
    pub(crate) fn for_tests(tts_base_url: &str, output_dir: &std::path::Path) -> Self {
        let output_dir = output_dir.to_string_lossy().to_string();
        let tts_base_url = tts_base_url.to_string();
        Self::from_lookup(|key| match key {
            "GOOGLE_CLOUD_API_KEY" => Some("test-key".to_string()),
            "TTS_BASE_URL" => Some(tts_base_url.clone()),
            "OUTPUT_DIR" => Some(output_dir.clone()),
            _ => None,
        })
        .unwrap()
    }
}

fn value_or<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| default.to_string())
}

fn value_or_parse<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|err| anyhow::anyhow!("{key} is invalid: {err}")),
        None => Ok(default),
    }
}

fn parse_cors_origins(value: &str) -> (bool, Vec<String>) {
    let origins = parse_list(value);

    if origins.iter().any(|item| item == "*") {
        (true, Vec::new())
    } else {
        (false, origins)
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| values.get(key).cloned())
    }

    #[test]
    fn defaults_match_service_policy() {
        let cfg = load(&[("GOOGLE_CLOUD_API_KEY", "abc")]).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:8000");
        assert_eq!(cfg.rate_limit_per_minute, 60);
        assert_eq!(cfg.rate_limit_burst, 100);
        assert_eq!(cfg.rate_limit_sweep_secs, 60);
        assert_eq!(cfg.file_expiry_hours, 24);
        assert_eq!(cfg.output_dir, "output");
        assert!(!cfg.cors_allow_any);
        assert_eq!(cfg.cors_origins, vec!["http://localhost:5173".to_string()]);
        assert!(!cfg.trust_forwarded_for);
    }

    #[test]
    fn api_key_is_required() {
        assert!(load(&[]).is_err());
        assert!(load(&[("GOOGLE_CLOUD_API_KEY", "  ")]).is_err());
    }

    #[test]
    fn rejects_unparseable_numbers() {
        let err = load(&[
            ("GOOGLE_CLOUD_API_KEY", "abc"),
            ("RATE_LIMIT_PER_MINUTE", "-5"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("RATE_LIMIT_PER_MINUTE"));
    }

    #[test]
    fn rejects_zero_sweep_period() {
        assert!(load(&[
            ("GOOGLE_CLOUD_API_KEY", "abc"),
            ("RATE_LIMIT_SWEEP_SECS", "0"),
        ])
        .is_err());
    }

    #[test]
    fn rejects_out_of_range_file_expiry() {
        for hours in ["0", "-3", "3000000000"] {
            assert!(load(&[
                ("GOOGLE_CLOUD_API_KEY", "abc"),
                ("FILE_EXPIRY_HOURS", hours),
            ])
            .is_err());
        }
        let cfg = load(&[
            ("GOOGLE_CLOUD_API_KEY", "abc"),
            ("FILE_EXPIRY_HOURS", "876000"),
        ])
        .unwrap();
        assert_eq!(cfg.file_expiry_hours, 876_000);
    }

    #[test]
    fn wildcard_cors_allows_any_origin() {
        let cfg = load(&[
            ("GOOGLE_CLOUD_API_KEY", "abc"),
            ("CORS_ORIGINS", "https://a.example, *"),
        ])
        .unwrap();
        assert!(cfg.cors_allow_any);
        assert!(cfg.cors_origins.is_empty());
    }
}
