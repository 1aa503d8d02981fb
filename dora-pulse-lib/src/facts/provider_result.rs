use std::sync::Arc;

/// Outcome of collecting data for one repository.
#[derive(Debug, Clone)]
pub enum ProviderResult<T> {
    /// The data was collected, possibly from incomplete listings.
    Found(T),

    /// Collection failed for this repository. Other repositories are unaffected.
    Error(Arc<ohno::AppError>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use ohno::app_err;

    #[test]
    fn test_debug_error() {
        let result: ProviderResult<i32> = ProviderResult::Error(Arc::new(app_err!("test error")));
        let debug_str = format!("{result:?}");
        assert!(debug_str.contains("Error"));
    }
}
