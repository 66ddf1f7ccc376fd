use serde_json::{json, Map, Value};

pub fn thing_id(sys_id: u8) -> String {
    format!("urn:dev:ops:drone:{sys_id}")
}

/// Minimal capability description announced to the directory.
pub fn describe<'a>(
    name: &str,
    sys_id: u8,
    properties: impl IntoIterator<Item = &'a str>,
    actions: impl IntoIterator<Item = &'a str>,
) -> Value {
    let properties: Map<String, Value> = properties
        .into_iter()
        .map(|p| (p.to_string(), json!({"readOnly": true, "observable": true})))
        .collect();
    let actions: Map<String, Value> = actions.into_iter().map(|a| (a.to_string(), json!({}))).collect();

    json!({
        "@context": "https://www.w3.org/2022/wot/td/v1.1",
        "@type": "Thing",
        "id": thing_id(sys_id),
        "title": format!("{name}-thing"),
        "securityDefinitions": {"nosec_sc": {"scheme": "nosec"}},
        "security": "nosec_sc",
        "properties": properties,
        "actions": actions,
    })
}
