use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use necker_core::ObjectRevisionMeta;

/// The slice of `ObjectMeta` the aggregators and blame attributor read.
///
/// Ownership entries without a manager name are kept with an empty name so the
/// timestamp still advances the blame high-water mark.
pub fn project(meta: &ObjectMeta) -> ObjectRevisionMeta {
    let mut out = ObjectRevisionMeta::new(meta.namespace.as_deref(), meta.name.clone().unwrap_or_default());
    if let Some(ts) = &meta.creation_timestamp {
        out = out.created_at(ts.0);
    }
    if let Some(labels) = &meta.labels {
        out.labels = labels.clone();
    }
    for entry in meta.managed_fields.iter().flatten() {
        out = out.with_manager(entry.manager.clone().unwrap_or_default(), entry.time.as_ref().map(|t| t.0));
    }
    out
}
