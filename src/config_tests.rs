// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `config.rs`

#[cfg(test)]
mod tests {
    use crate::config::{Config, Mode};
    use crate::errors::ConfigError;

    #[test]
    fn test_minimal_config() {
        let config = Config::from_yaml("zones: [\"example.org\"]\n").unwrap();
        assert_eq!(config.zones, vec!["example.org.".to_string()]);
        assert_eq!(config.mode, Mode::FilterByZones);
        assert_eq!(config.ttl, 10);
        assert!(!config.transitive);
        assert!(!config.slave);
        assert!(config.fall_through.is_none());
    }

    #[test]
    fn test_zones_are_normalised() {
        let config = Config::from_yaml("zones: [\"Example.ORG.\"]\n").unwrap();
        assert_eq!(config.zones, vec!["example.org.".to_string()]);
    }

    #[test]
    fn test_no_zones_rejected() {
        assert!(matches!(
            Config::from_yaml("zones: []\n"),
            Err(ConfigError::NoZones)
        ));
    }

    #[test]
    fn test_unknown_property_rejected() {
        let result = Config::from_yaml("zones: [\"example.org\"]\nbogus: true\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_ttl_out_of_range() {
        let result = Config::from_yaml("zones: [\"example.org\"]\nttl: 3601\n");
        assert!(matches!(result, Err(ConfigError::TtlOutOfRange(3601))));
    }

    #[test]
    fn test_invalid_mode() {
        let result = Config::from_yaml("zones: [\"example.org\"]\nmode: Bogus\n");
        assert!(matches!(result, Err(ConfigError::InvalidMode(_))));
    }

    #[test]
    fn test_primary_mode_requires_zone_object_and_single_namespace() {
        let result = Config::from_yaml(
            "zones: [\"example.org\"]\nmode: Primary\nnamespaces: [\"dns\"]\n",
        );
        assert!(matches!(result, Err(ConfigError::PrimaryRequiresZoneObject)));

        let result = Config::from_yaml(
            "zones: [\"example.org\"]\nmode: Primary\nzoneObject: root\nnamespaces: [\"a\", \"b\"]\n",
        );
        assert!(matches!(
            result,
            Err(ConfigError::PrimaryRequiresSingleNamespace)
        ));

        let config = Config::from_yaml(
            "zones: [\"example.org\"]\nmode: Primary\nzoneObject: root\nnamespaces: [\"dns\"]\n",
        )
        .unwrap();
        assert_eq!(
            config.zone_ref(),
            Some(("dns".to_string(), "root".to_string()))
        );
    }

    #[test]
    fn test_zone_object_outside_primary_rejected() {
        let result = Config::from_yaml("zones: [\"example.org\"]\nzoneObject: root\n");
        assert!(matches!(result, Err(ConfigError::ZoneObjectRequiresPrimary)));
    }

    #[test]
    fn test_non_filter_modes_require_single_zone() {
        let result = Config::from_yaml(
            "zones: [\"example.org\", \"example.net\"]\nmode: Subdomains\n",
        );
        assert!(matches!(result, Err(ConfigError::ModeRequiresSingleZone(_))));
    }

    #[test]
    fn test_multiple_endpoints_rejected() {
        let result = Config::from_yaml(
            "zones: [\"example.org\"]\nendpoint: [\"https://a:6443\", \"https://b:6443\"]\n",
        );
        assert!(matches!(result, Err(ConfigError::MultipleEndpoints)));

        let config =
            Config::from_yaml("zones: [\"example.org\"]\nendpoint: \"https://a:6443\"\n").unwrap();
        assert_eq!(config.endpoint.as_deref(), Some("https://a:6443"));
    }

    #[test]
    fn test_token_and_kubeconfig_are_exclusive() {
        let result = Config::from_yaml(
            "zones: [\"example.org\"]\nendpoint: \"https://a:6443\"\ntokenFile: /t\nkubeconfig: /k\n",
        );
        assert!(matches!(result, Err(ConfigError::TokenAndKubeconfig)));
    }

    #[test]
    fn test_token_requires_endpoint() {
        let result = Config::from_yaml("zones: [\"example.org\"]\ntokenFile: /t\n");
        assert!(matches!(result, Err(ConfigError::TokenRequiresEndpoint)));
    }

    #[test]
    fn test_label_selector_parsed() {
        let config =
            Config::from_yaml("zones: [\"example.org\"]\nlabels: \"app=dns\"\n").unwrap();
        assert_eq!(config.labels.unwrap().as_str(), "app=dns");

        let result = Config::from_yaml("zones: [\"example.org\"]\nlabels: \"=broken\"\n");
        assert!(matches!(result, Err(ConfigError::InvalidSelector { .. })));
    }

    #[test]
    fn test_fallthrough_zones_normalised() {
        let config = Config::from_yaml(
            "zones: [\"example.org\"]\nfallthrough: [\"Legacy.Example.Org\"]\n",
        )
        .unwrap();
        assert_eq!(
            config.fall_through,
            Some(vec!["legacy.example.org.".to_string()])
        );
    }

    #[test]
    fn test_listen_addresses() {
        let config = Config::from_yaml(
            "zones: [\"example.org\"]\nlisten: \"127.0.0.1:5300\"\nmetricsAddr: \"127.0.0.1:9100\"\n",
        )
        .unwrap();
        assert_eq!(config.listen.port(), 5300);
        assert_eq!(config.metrics_addr.port(), 9100);

        let result = Config::from_yaml("zones: [\"example.org\"]\nlisten: \"nonsense\"\n");
        assert!(matches!(result, Err(ConfigError::InvalidListenAddr(_))));
    }
}
