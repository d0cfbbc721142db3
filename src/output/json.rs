use kube::api::DynamicObject;

pub struct JsonFormatter;

impl JsonFormatter {
    pub fn format(obj: &DynamicObject) -> String {
        serde_json::to_string_pretty(obj).unwrap_or_else(|_| "{}".to_string())
    }
}
