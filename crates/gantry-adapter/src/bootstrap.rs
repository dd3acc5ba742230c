//! Bootstrap user-data rendering
//!
//! Builds the base64 payload handed to a new instance: the operator's
//! bootstrap template with every line starting with `### SETTINGS` replaced
//! by the values the booting node needs to reach the installer.

use crate::config::{AdapterConfig, ConfigError};
use std::fs;
use std::net::IpAddr;
use tracing::info;

/// Marker line replaced with the rendered settings block
pub const SETTINGS_MARKER: &str = "### SETTINGS";

/// Render the base64 user data for one launch, if a template is configured
pub fn user_data(
    config: &AdapterConfig,
    installer_ip: Option<IpAddr>,
) -> Result<Option<String>, ConfigError> {
    let Some(path) = &config.bootstrap.user_data_template else {
        return Ok(None);
    };

    info!(template = %path.display(), "Using bootstrap script template");

    let template =
        fs::read_to_string(path).map_err(|source| ConfigError::UnreadableUserDataTemplate {
            path: path.clone(),
            source,
        })?;

    let script = splice(&template, &settings_block(config, installer_ip));

    Ok(Some(base64::Engine::encode(
        &base64::engine::general_purpose::STANDARD,
        script.as_bytes(),
    )))
}

/// Replace marker lines with the settings block, leaving all else untouched
fn splice(template: &str, settings: &str) -> String {
    let mut result = String::with_capacity(template.len() + settings.len());

    for line in template.lines() {
        if line.starts_with(SETTINGS_MARKER) {
            result.push_str(settings);
        } else {
            result.push_str(line);
            result.push('\n');
        }
    }

    result
}

/// The variable assignments a bootstrap script sources
fn settings_block(config: &AdapterConfig, installer_ip: Option<IpAddr>) -> String {
    let dns = &config.dns;

    format!(
        "installerHostName = '{hostname}'\n\
         installerIpAddress = {ip}\n\
         port = {port}\n\
         \n\
         # DNS resolution settings\n\
         override_dns_domain = {override_dns}\n\
         dns_search = {search}\n\
         dns_nameservers = {nameservers}\n",
        hostname = config.installer.hostname,
        ip = quoted_or_none(installer_ip.map(|ip| ip.to_string()).as_deref()),
        port = config.installer.admin_port,
        override_dns = if dns.zone.is_some() { "True" } else { "False" },
        search = quoted_or_none(dns.search.as_deref()),
        nameservers = encoded_list(&dns.nameservers),
    )
}

fn quoted_or_none(value: Option<&str>) -> String {
    match value {
        Some(v) => format!("'{v}'"),
        None => "None".to_string(),
    }
}

fn encoded_list(items: &[String]) -> String {
    if items.is_empty() {
        return "[]".to_string();
    }

    let quoted: Vec<String> = items.iter().map(|item| format!("'{item}'")).collect();
    format!("[{}]", quoted.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn decode(encoded: &str) -> String {
        let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded)
            .expect("valid base64");
        String::from_utf8(bytes).expect("valid utf-8")
    }

    fn config_with_template(template: &NamedTempFile) -> AdapterConfig {
        let mut config = AdapterConfig::default();
        config.installer.hostname = "installer.cluster.example.com".to_string();
        config.installer.admin_port = 8443;
        config.dns.search = Some("cluster.example.com".to_string());
        config.dns.nameservers = vec!["10.0.0.2".to_string()];
        config.bootstrap.user_data_template = Some(template.path().to_path_buf());
        config
    }

    #[test]
    fn test_no_template_means_no_user_data() {
        let config = AdapterConfig::default();
        assert!(user_data(&config, None).unwrap().is_none());
    }

    #[test]
    fn test_marker_line_is_replaced() {
        let mut template = NamedTempFile::new().unwrap();
        writeln!(template, "#!/bin/bash").unwrap();
        writeln!(template, "### SETTINGS - replaced at launch").unwrap();
        writeln!(template, "run_bootstrap").unwrap();

        let config = config_with_template(&template);
        let encoded = user_data(&config, Some("10.0.0.5".parse().unwrap()))
            .unwrap()
            .unwrap();
        let script = decode(&encoded);

        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains("installerHostName = 'installer.cluster.example.com'"));
        assert!(script.contains("installerIpAddress = '10.0.0.5'"));
        assert!(script.contains("port = 8443"));
        assert!(script.contains("dns_search = 'cluster.example.com'"));
        assert!(script.contains("dns_nameservers = ['10.0.0.2']"));
        assert!(script.contains("run_bootstrap"));
        assert!(!script.contains("### SETTINGS"));
    }

    #[test]
    fn test_unknown_installer_ip_renders_none() {
        let mut template = NamedTempFile::new().unwrap();
        writeln!(template, "### SETTINGS").unwrap();

        let config = config_with_template(&template);
        let script = decode(&user_data(&config, None).unwrap().unwrap());

        assert!(script.contains("installerIpAddress = None"));
    }

    #[test]
    fn test_template_without_marker_is_unchanged() {
        let mut template = NamedTempFile::new().unwrap();
        writeln!(template, "#!/bin/bash").unwrap();
        writeln!(template, "echo hello").unwrap();

        let config = config_with_template(&template);
        let script = decode(&user_data(&config, None).unwrap().unwrap());

        assert_eq!(script, "#!/bin/bash\necho hello\n");
    }

    #[test]
    fn test_missing_template_file_is_a_config_error() {
        let mut config = AdapterConfig::default();
        config.installer.hostname = "installer.example.com".to_string();
        config.bootstrap.user_data_template = Some("/nonexistent/bootstrap.sh".into());

        let err = user_data(&config, None).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnreadableUserDataTemplate { .. }
        ));
    }

    #[test]
    fn test_empty_nameserver_list_renders_empty() {
        let mut template = NamedTempFile::new().unwrap();
        writeln!(template, "### SETTINGS").unwrap();

        let mut config = config_with_template(&template);
        config.dns.nameservers.clear();
        config.dns.search = None;

        let script = decode(&user_data(&config, None).unwrap().unwrap());
        assert!(script.contains("dns_nameservers = []"));
        assert!(script.contains("dns_search = None"));
        assert!(script.contains("override_dns_domain = False"));
    }
}
