use super::*;

#[tokio::test]
async fn test_subscribers_receive_in_publish_order() {
    let bus: ChannelActionBus<&'static str> = ChannelActionBus::default();
    let mut first = bus.subscribe();
    let mut second = bus.subscribe();

    bus.publish(Arc::new(Emission::Apply("applied")));
    bus.publish(Arc::new(Emission::Compensate("rolled back")));

    for receiver in [&mut first, &mut second] {
        let a = receiver.recv().await.unwrap();
        let b = receiver.recv().await.unwrap();
        assert_eq!(*a, Emission::Apply("applied"));
        assert_eq!(*b, Emission::Compensate("rolled back"));
    }
}

#[test]
fn test_publish_without_subscribers_is_not_an_error() {
    let bus: ChannelActionBus<u32> = ChannelActionBus::new(4);
    assert_eq!(bus.receiver_count(), 0);

    bus.publish(Arc::new(Emission::Apply(1)));
}

#[tokio::test]
async fn test_lagging_subscriber_observes_lag() {
    let bus: ChannelActionBus<u32> = ChannelActionBus::new(1);
    let mut receiver = bus.subscribe();

    bus.publish(Arc::new(Emission::Apply(1)));
    bus.publish(Arc::new(Emission::Apply(2)));

    assert!(matches!(
        receiver.recv().await,
        Err(broadcast::error::RecvError::Lagged(1))
    ));
    assert_eq!(*receiver.recv().await.unwrap(), Emission::Apply(2));
}

#[test]
fn test_from_settings_uses_capacity() {
    let settings = BusSettings { capacity: 0 };
    let bus: ChannelActionBus<u32> = ChannelActionBus::from_settings(&settings);
    let _receiver = bus.subscribe();

    assert_eq!(bus.receiver_count(), 1);
}
