mod common;

mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration as StdDuration;

    use embassy_time::Duration;
    use lightfx_conductor::{MessageQueue, Rendezvous, TryReceiveError, TrySendError};

    use crate::common::HostKernel;

    #[test]
    fn test_fifo_order_and_capacity() {
        let queue: MessageQueue<u8, 2> = MessageQueue::new();
        assert!(queue.is_empty());
        queue.try_send(1).unwrap();
        queue.try_send(2).unwrap();
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.try_send(3), Err(TrySendError(3)));
        assert_eq!(queue.try_receive(), Ok(1));
        assert_eq!(queue.try_receive(), Ok(2));
        assert_eq!(queue.try_receive(), Err(TryReceiveError));
    }

    #[test]
    fn test_send_timeout_hands_the_message_back() {
        let kernel = HostKernel;
        let queue: MessageQueue<u8, 1> = MessageQueue::new();
        queue.try_send(1).unwrap();

        let start = std::time::Instant::now();
        let rejected = queue.send_timeout(9, Duration::from_millis(50), &kernel);
        assert_eq!(rejected, Err(TrySendError(9)));
        assert!(start.elapsed() >= StdDuration::from_millis(45));
        // The queue itself is untouched
        assert_eq!(queue.try_receive(), Ok(1));
    }

    #[test]
    fn test_send_timeout_succeeds_once_drained() {
        let kernel = HostKernel;
        let queue: Arc<MessageQueue<u8, 2>> = Arc::new(MessageQueue::new());
        queue.try_send(1).unwrap();
        queue.try_send(2).unwrap();

        let drainer = queue.clone();
        let handle = thread::spawn(move || {
            thread::sleep(StdDuration::from_millis(30));
            drainer.try_receive()
        });

        assert_eq!(
            queue.send_timeout(3, Duration::from_millis(500), &kernel),
            Ok(())
        );
        assert_eq!(handle.join().unwrap(), Ok(1));
        assert_eq!(queue.try_receive(), Ok(2));
        assert_eq!(queue.try_receive(), Ok(3));
    }

    #[test]
    fn test_receive_timeout_expires_empty() {
        let kernel = HostKernel;
        let queue: MessageQueue<u8, 2> = MessageQueue::new();
        let start = std::time::Instant::now();
        assert_eq!(queue.receive_timeout(Duration::from_millis(50), &kernel), None);
        assert!(start.elapsed() >= StdDuration::from_millis(45));
    }

    #[test]
    fn test_receive_timeout_picks_up_a_late_message() {
        let kernel = HostKernel;
        let queue: Arc<MessageQueue<u8, 2>> = Arc::new(MessageQueue::new());
        let sender = queue.clone();
        thread::spawn(move || {
            thread::sleep(StdDuration::from_millis(30));
            sender.try_send(7).unwrap();
        });
        assert_eq!(
            queue.receive_timeout(Duration::from_millis(500), &kernel),
            Some(7)
        );
    }

    #[test]
    fn test_rendezvous_delivers_across_tasks() {
        let kernel = HostKernel;
        let rendezvous: Arc<Rendezvous<u32>> = Arc::new(Rendezvous::new());
        let completer = rendezvous.clone();
        thread::spawn(move || {
            thread::sleep(StdDuration::from_millis(30));
            completer.complete(7);
        });

        assert_eq!(rendezvous.wait(Duration::from_millis(500), &kernel), Some(7));
        // Single use; the value was claimed
        assert_eq!(rendezvous.try_take(), None);
    }

    #[test]
    fn test_rendezvous_wait_expires() {
        let kernel = HostKernel;
        let rendezvous: Rendezvous<u32> = Rendezvous::new();
        let start = std::time::Instant::now();
        assert_eq!(rendezvous.wait(Duration::from_millis(50), &kernel), None);
        assert!(start.elapsed() >= StdDuration::from_millis(45));

        // A completion landing after the waiter gave up stays claimable
        rendezvous.complete(9);
        assert_eq!(rendezvous.try_take(), Some(9));
    }
}
