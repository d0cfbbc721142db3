use kube::api::DynamicObject;

pub struct YamlFormatter;

impl YamlFormatter {
    pub fn format(obj: &DynamicObject) -> String {
        serde_yaml::to_string(obj).unwrap_or_else(|_| "{}".to_string())
    }
}
