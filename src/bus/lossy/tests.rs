use super::*;
use crate::event::Event;
use crate::test_utils::RecordingHandler;

fn make_event(sequence: Sequence) -> Arc<SequencedEvent> {
    Arc::new(SequencedEvent::new(
        sequence,
        Event::new("ParentCreated", Default::default()),
    ))
}

#[test]
fn test_lossy_config_none() {
    let config = LossyConfig::none();
    assert_eq!(config.drop_rate, 0.0);
    assert!(!config.is_lossy());
}

#[test]
fn test_lossy_config_with_rate() {
    let config = LossyConfig::with_drop_rate(0.5);
    assert_eq!(config.drop_rate, 0.5);
    assert!(config.is_lossy());
}

#[test]
fn test_lossy_config_clamps_rate() {
    let low = LossyConfig::with_drop_rate(-0.5);
    assert_eq!(low.drop_rate, 0.0);

    let high = LossyConfig::with_drop_rate(1.5);
    assert_eq!(high.drop_rate, 1.0);
}

#[test]
fn test_lossy_config_dropping_sequences_is_lossy() {
    let config = LossyConfig::none().dropping([3, 5]);
    assert!(config.is_lossy());
    assert!(config.drop_sequences.contains(&3));
}

#[tokio::test]
async fn test_passthrough_delivers_all() {
    let inner = Arc::new(RecordingHandler::default());
    let lossy = LossyHandler::passthrough(inner.clone());

    for seq in 1..=10 {
        lossy.handle(make_event(seq)).await.unwrap();
    }

    let (total, dropped, passed) = lossy.stats().snapshot();
    assert_eq!(total, 10);
    assert_eq!(dropped, 0);
    assert_eq!(passed, 10);
    assert_eq!(inner.sequences().len(), 10);
}

#[tokio::test]
async fn test_drop_all_drops_everything() {
    let inner = Arc::new(RecordingHandler::default());
    let lossy = LossyHandler::new(inner.clone(), LossyConfig::drop_all());

    for seq in 1..=10 {
        let result = lossy.handle(make_event(seq)).await;
        assert!(matches!(result, Err(BusError::Dropped)));
    }

    let (total, dropped, passed) = lossy.stats().snapshot();
    assert_eq!(total, 10);
    assert_eq!(dropped, 10);
    assert_eq!(passed, 0);
    assert!(inner.sequences().is_empty());
}

#[tokio::test]
async fn test_drop_sequences_drops_only_those() {
    let inner = Arc::new(RecordingHandler::default());
    let lossy = LossyHandler::new(inner.clone(), LossyConfig::none().dropping([2, 4]));

    for seq in 1..=5 {
        let _ = lossy.handle(make_event(seq)).await;
    }

    assert_eq!(inner.sequences(), vec![1, 3, 5]);
    assert_eq!(lossy.stats().snapshot(), (5, 2, 3));
}

#[tokio::test]
async fn test_offline_toggle() {
    let inner = Arc::new(RecordingHandler::default());
    let lossy = LossyHandler::passthrough(inner.clone());

    lossy.set_offline(true);
    assert!(lossy.handle(make_event(1)).await.is_err());

    lossy.set_offline(false);
    assert!(lossy.handle(make_event(2)).await.is_ok());

    assert_eq!(inner.sequences(), vec![2]);
}

#[test]
fn test_observed_drop_rate() {
    let stats = LossyStats::default();
    assert_eq!(stats.observed_drop_rate(), 0.0);

    stats.total.store(4, Ordering::Relaxed);
    stats.dropped.store(1, Ordering::Relaxed);
    assert!((stats.observed_drop_rate() - 0.25).abs() < f64::EPSILON);
    assert_eq!(stats.snapshot(), (4, 1, 0));
}
