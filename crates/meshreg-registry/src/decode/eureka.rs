//! Eureka `InstanceInfo` bodies, JSON or XML.

use std::collections::HashMap;

use meshreg_types::RegistryType;
use serde::Deserialize;

use super::RegistrationRecord;
use super::is_json;
use crate::error::DecodeError;

#[derive(Debug, Deserialize)]
struct EurekaPort {
    #[serde(rename = "$text", alias = "$")]
    value: u16,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EurekaInstance {
    #[serde(default)]
    instance_id: String,
    #[serde(default)]
    host_name: String,
    app: String,
    ip_addr: String,
    port: EurekaPort,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

/// REST clients wrap the instance; some send it bare.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EurekaJson {
    Wrapped { instance: EurekaInstance },
    Bare(EurekaInstance),
}

pub(super) fn decode(content_type: &str, body: &[u8]) -> Result<RegistrationRecord, DecodeError> {
    let malformed = |reason: String| DecodeError::MalformedBody {
        registry_type: RegistryType::Eureka,
        content_type: content_type.to_string(),
        reason,
    };

    let instance = if is_json(content_type) {
        match serde_json::from_slice::<EurekaJson>(body).map_err(|e| malformed(e.to_string()))? {
            EurekaJson::Wrapped { instance } | EurekaJson::Bare(instance) => instance,
        }
    } else {
        let text = std::str::from_utf8(body).map_err(|e| malformed(e.to_string()))?;
        quick_xml::de::from_str::<EurekaInstance>(text).map_err(|e| malformed(e.to_string()))?
    };

    let instance_id = if instance.instance_id.is_empty() {
        instance.host_name
    } else {
        instance.instance_id
    };
    if instance_id.is_empty() {
        return Err(malformed("neither instanceId nor hostName is set".to_string()));
    }
    // XML maps carry element attributes such as `class` as `@class` keys.
    let labels = instance.metadata.into_iter().filter(|(key, _)| !key.starts_with('@')).collect();

    Ok(RegistrationRecord {
        registry_type: RegistryType::Eureka,
        service_name: instance.app,
        instance_id,
        ip: instance.ip_addr,
        port: instance.port.value,
        labels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON_BODY: &str = r#"{
        "instance": {
            "instanceId": "i-1",
            "hostName": "orders-host",
            "app": "ORDERS",
            "ipAddr": "10.0.0.5",
            "status": "UP",
            "port": {"$": 8080, "@enabled": "true"},
            "metadata": {"zone": "a"}
        }
    }"#;

    const XML_BODY: &str = r#"<instance>
        <instanceId>i-1</instanceId>
        <hostName>orders-host</hostName>
        <app>ORDERS</app>
        <ipAddr>10.0.0.5</ipAddr>
        <status>UP</status>
        <port enabled="true">8080</port>
        <metadata><zone>a</zone></metadata>
    </instance>"#;

    fn expected() -> RegistrationRecord {
        RegistrationRecord {
            registry_type: RegistryType::Eureka,
            service_name: "ORDERS".into(),
            instance_id: "i-1".into(),
            ip: "10.0.0.5".into(),
            port: 8080,
            labels: HashMap::from([("zone".to_string(), "a".to_string())]),
        }
    }

    #[test]
    fn decodes_json_instance() {
        assert_eq!(decode("application/json", JSON_BODY.as_bytes()).unwrap(), expected());
    }

    #[test]
    fn decodes_xml_for_any_other_content_type() {
        assert_eq!(decode("application/xml", XML_BODY.as_bytes()).unwrap(), expected());
        assert_eq!(decode("", XML_BODY.as_bytes()).unwrap(), expected());
    }

    #[test]
    fn instance_id_falls_back_to_host_name() {
        let body = r#"{"instance": {"hostName": "orders-host", "app": "ORDERS", "ipAddr": "10.0.0.5", "port": {"$": 8080}}}"#;
        let record = decode("application/json", body.as_bytes()).unwrap();
        assert_eq!(record.instance_id, "orders-host");
        assert!(record.labels.is_empty());
    }

    #[test]
    fn instance_without_any_identity_is_malformed() {
        let body = r#"{"instance": {"app": "ORDERS", "ipAddr": "10.0.0.5", "port": {"$": 8080}}}"#;
        let err = decode("application/json", body.as_bytes()).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedBody { ref reason, .. } if reason.contains("hostName")));

        let xml = "<instance><app>ORDERS</app><ipAddr>10.0.0.5</ipAddr><port>8080</port></instance>";
        assert!(decode("application/xml", xml.as_bytes()).is_err());
    }

    #[test]
    fn xml_body_sent_as_json_is_malformed() {
        let err = decode("application/json", XML_BODY.as_bytes()).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedBody { registry_type: RegistryType::Eureka, .. }));
        assert!(!err.is_defect());
    }
}
