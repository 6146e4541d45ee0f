use tracing::trace;
use uuid::Uuid;

use parley_types::events::GatewayEvent;
use parley_types::models::ConversationTarget;

use crate::dispatcher::Dispatcher;

/// Forward a typing start/stop signal. Nothing is stored and no timing is
/// enforced here; clients send the stop signal themselves after going idle.
///
/// Group signals go to every other connection in the room (`origin` is the
/// connection that sent it). Direct signals go to the receiver only.
/// Returns the number of connections reached.
pub async fn notify_typing(
    dispatcher: &Dispatcher,
    sender_id: Uuid,
    origin: Option<Uuid>,
    target: ConversationTarget,
    started: bool,
) -> usize {
    let receiver_id = target.receiver_id();
    let group_id = target.group_id();
    let event = if started {
        GatewayEvent::Typing { sender_id, receiver_id, group_id }
    } else {
        GatewayEvent::StopTyping { sender_id, receiver_id, group_id }
    };
    trace!("{} from {} to {:?}", event.name(), sender_id, target);

    match target {
        ConversationTarget::Group(group_id) => {
            dispatcher.send_to_room_except(group_id, origin, event).await
        }
        ConversationTarget::Direct(receiver_id) => {
            usize::from(dispatcher.send_to_user(receiver_id, event).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::PresenceRegistry;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn drain(rx: &mut UnboundedReceiver<GatewayEvent>) -> Vec<GatewayEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn direct_typing_reaches_receiver_only() {
        let dispatcher = Dispatcher::new(PresenceRegistry::new());
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let (alice_conn, mut alice_rx) = dispatcher.connect(Some(alice)).await;
        let (_, mut bob_rx) = dispatcher.connect(Some(bob)).await;
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        let reached = notify_typing(
            &dispatcher,
            alice,
            Some(alice_conn),
            ConversationTarget::Direct(bob),
            true,
        )
        .await;
        assert_eq!(reached, 1);

        match drain(&mut bob_rx).as_slice() {
            [GatewayEvent::Typing { sender_id, receiver_id, group_id }] => {
                assert_eq!(*sender_id, alice);
                assert_eq!(*receiver_id, Some(bob));
                assert!(group_id.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(drain(&mut alice_rx).is_empty());
    }

    #[tokio::test]
    async fn stop_typing_to_offline_user_reaches_nobody() {
        let dispatcher = Dispatcher::new(PresenceRegistry::new());
        let reached = notify_typing(
            &dispatcher,
            Uuid::new_v4(),
            None,
            ConversationTarget::Direct(Uuid::new_v4()),
            false,
        )
        .await;
        assert_eq!(reached, 0);
    }

    #[tokio::test]
    async fn group_typing_skips_the_origin_connection() {
        let dispatcher = Dispatcher::new(PresenceRegistry::new());
        let group = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let (alice_conn, mut alice_rx) = dispatcher.connect(Some(alice)).await;
        let (bob_conn, mut bob_rx) = dispatcher.connect(Some(Uuid::new_v4())).await;
        let (carol_conn, mut carol_rx) = dispatcher.connect(Some(Uuid::new_v4())).await;
        for conn in [alice_conn, bob_conn, carol_conn] {
            dispatcher.join_room(conn, group).await;
        }
        for rx in [&mut alice_rx, &mut bob_rx, &mut carol_rx] {
            drain(rx);
        }

        let reached = notify_typing(
            &dispatcher,
            alice,
            Some(alice_conn),
            ConversationTarget::Group(group),
            false,
        )
        .await;
        assert_eq!(reached, 2);
        assert!(drain(&mut alice_rx).is_empty());
        for rx in [&mut bob_rx, &mut carol_rx] {
            assert!(matches!(
                drain(rx).as_slice(),
                [GatewayEvent::StopTyping { group_id: Some(g), .. }] if *g == group
            ));
        }
    }
}
