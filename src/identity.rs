use uuid::Uuid;

/// Identifies this tool towards the cluster, e.g. as the field manager of created Jobs.
pub fn default_source() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Creates a new random identifier for a run.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
