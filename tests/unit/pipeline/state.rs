use super::*;

#[test]
fn begins_once_from_idle() {
    let cell = StateCell::new();
    assert_eq!(cell.get(), PipelineState::Idle);
    assert!(cell.try_begin().is_ok());
    assert_eq!(cell.get(), PipelineState::Writing);
}

#[test]
fn in_flight_session_rejects_start_as_concurrent() {
    let cell = StateCell::new();
    cell.try_begin().unwrap();
    assert!(matches!(
        cell.try_begin(),
        Err(PipelineError::ConcurrentSessionRejected)
    ));

    assert!(cell.transition(PipelineState::Writing, PipelineState::Finished));
    assert!(matches!(
        cell.try_begin(),
        Err(PipelineError::ConcurrentSessionRejected)
    ));
}

#[test]
fn discarded_is_terminal() {
    let cell = StateCell::new();
    cell.set(PipelineState::Discarded);
    assert!(matches!(cell.try_begin(), Err(PipelineError::AlreadyDiscarded)));
    assert!(!cell.transition(PipelineState::Writing, PipelineState::Finished));
    assert_eq!(cell.get(), PipelineState::Discarded);
}
