use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        PipelineError::AlreadyDiscarded
            .to_string()
            .contains("usage error:")
    );
    assert!(
        PipelineError::pool_exhausted("x")
            .to_string()
            .contains("pool exhausted:")
    );
    assert!(
        PipelineError::malformed_path("x")
            .to_string()
            .contains("malformed path:")
    );
    assert!(
        PipelineError::encoder("x")
            .to_string()
            .contains("encoder error:")
    );
    assert!(
        PipelineError::validation("x")
            .to_string()
            .contains("validation error:")
    );
}

#[test]
fn kinds_follow_taxonomy() {
    assert_eq!(PipelineError::AlreadyDiscarded.kind(), ErrorKind::Usage);
    assert_eq!(
        PipelineError::ConcurrentSessionRejected.kind(),
        ErrorKind::Usage
    );
    assert_eq!(PipelineError::pool_exhausted("x").kind(), ErrorKind::Resource);
    assert_eq!(PipelineError::malformed_path("x").kind(), ErrorKind::Data);
    assert_eq!(PipelineError::rasterization("x").kind(), ErrorKind::Data);
    let order = PipelineError::TimestampOrderViolation {
        last: PresentationTime::ZERO,
        got: PresentationTime::ZERO,
    };
    assert_eq!(order.kind(), ErrorKind::Encoder);
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = PipelineError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
    assert_eq!(err.kind(), ErrorKind::Other);
}
