//! Capacity derivation from provider shape names

/// Derive a vcpu count from a provider shape name.
///
/// Fixed shapes on Oracle-style clouds encode their core count in the final
/// dot-separated segment (`VM.Standard1.4` has 4, `BM.Standard2.52` has 52).
/// Returns `None` for shapes that do not follow the convention, such as Flex
/// shapes, where callers must fall back to configured values.
pub fn vcpus_from_shape(shape: &str) -> Option<u32> {
    shape.rsplit('.').next()?.parse().ok()
}
