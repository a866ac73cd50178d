// Tests for the transport contract as seen by callers
// Focus: timeout behavior, closed state, concurrent close, scoped acquisition

#[cfg(test)]
mod transport_contract_tests {
    use super::super::config::TransportConfig;
    use super::super::error::{ErrorKind, TransportError, TransportResult};
    use super::super::memory::MemoryTransport;
    use super::super::timeout::Timeout;
    use super::super::types::{Transport, scoped};
    use std::io;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn no_default_timeouts() -> TransportConfig {
        TransportConfig {
            read_timeout_ms: None,
            write_timeout_ms: None,
            ..TransportConfig::default()
        }
    }

    // ============================================================
    // TIMEOUT TESTS
    // ============================================================

    #[tokio::test]
    async fn test_read_times_out_with_requested_value() {
        init_logger();
        let (left, _right) = MemoryTransport::pair(TransportConfig::default());

        let err = left.read(4, Timeout::Millis(100)).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.is(ErrorKind::Protocol));
        assert_eq!(err.to_string(), "Exceeded timeout of 100 ms");
        assert_eq!(
            err.cause::<io::Error>().map(io::Error::kind),
            Some(io::ErrorKind::TimedOut)
        );
        assert!(!left.closed(), "timeout must not close the transport");
    }

    #[tokio::test]
    async fn test_unspecified_timeout_uses_carrier_default() {
        init_logger();
        let config = TransportConfig {
            read_timeout_ms: Some(30),
            ..TransportConfig::default()
        };
        let (left, _right) = MemoryTransport::pair(config);

        let result = tokio::time::timeout(
            Duration::from_secs(1),
            left.read(1, Timeout::Unspecified),
        )
        .await
        .expect("default deadline should fire well within a second");

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        // the caller supplied no value, so none is reported
        assert_eq!(err.to_string(), "Exceeded timeout of inf ms");
    }

    #[tokio::test]
    async fn test_unspecified_timeout_without_default_keeps_waiting() {
        init_logger();
        let (left, _right) = MemoryTransport::pair(no_default_timeouts());

        let outer = tokio::time::timeout(
            Duration::from_millis(150),
            left.read(4, Timeout::Unspecified),
        )
        .await;

        assert!(outer.is_err(), "read without a deadline must not time out on its own");
    }

    #[tokio::test]
    async fn test_explicit_infinite_overrides_default() {
        init_logger();
        let config = TransportConfig {
            read_timeout_ms: Some(20),
            ..TransportConfig::default()
        };
        let (left, right) = MemoryTransport::pair(config);

        let reader = tokio::spawn(async move { left.read(3, Timeout::Infinite).await });
        tokio::time::sleep(Duration::from_millis(80)).await;
        right.write(b"abc", Timeout::Millis(100)).await.unwrap();

        let bytes = tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .expect("reader should finish once data arrives")
            .unwrap()
            .unwrap();
        assert_eq!(bytes, b"abc");
    }

    // ============================================================
    // CLOSED STATE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_operations_after_close_fail_with_closed() {
        init_logger();
        let (left, _right) = MemoryTransport::pair(TransportConfig::default());

        left.close().await.unwrap();
        assert!(left.closed(), "closed must be visible as soon as close returns");

        let err = left.read(1, Timeout::Millis(10)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Closed);
        assert_eq!(err.to_string(), "Transport is closed");

        let err = left.write(b"x", Timeout::Infinite).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Closed);
    }

    #[tokio::test]
    async fn test_close_unblocks_in_flight_read() {
        init_logger();
        let (left, _right) = MemoryTransport::pair(no_default_timeouts());
        let left = Arc::new(left);

        let reader = {
            let left = Arc::clone(&left);
            tokio::spawn(async move { left.read(8, Timeout::Infinite).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        left.close().await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .expect("close must not leave the reader hanging")
            .unwrap();
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Closed);
    }

    #[tokio::test]
    async fn test_close_unblocks_in_flight_write() {
        init_logger();
        let config = TransportConfig {
            channel_capacity: 1,
            ..no_default_timeouts()
        };
        let (left, _right) = MemoryTransport::pair(config);
        let left = Arc::new(left);
        left.write(b"fills the queue", Timeout::Infinite).await.unwrap();

        let writer = {
            let left = Arc::clone(&left);
            tokio::spawn(async move { left.write(b"blocked", Timeout::Infinite).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        left.close().await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), writer)
            .await
            .expect("close must not leave the writer hanging")
            .unwrap();
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Closed);
    }

    #[tokio::test]
    async fn test_peer_disconnect_forces_closed() {
        init_logger();
        let (left, right) = MemoryTransport::pair(TransportConfig::default());

        right.write(b"ab", Timeout::Millis(50)).await.unwrap();
        right.close().await.unwrap();

        // buffered bytes are still delivered before the disconnect surfaces
        assert_eq!(left.read(2, Timeout::Millis(50)).await.unwrap(), b"ab");

        let err = left.read(1, Timeout::Millis(50)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EndpointNotFound);
        assert!(err.is(ErrorKind::Protocol));
        assert!(left.closed(), "lost peer must be reported through closed()");

        let err = left.read(1, Timeout::Millis(50)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Closed);
    }

    #[tokio::test]
    async fn test_write_to_closed_peer_is_endpoint_not_found() {
        init_logger();
        let (left, right) = MemoryTransport::pair(TransportConfig::default());
        right.close().await.unwrap();

        let err = left.write(b"hello", Timeout::Millis(50)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EndpointNotFound);
        assert!(left.closed());
    }

    // ============================================================
    // CONCURRENCY TESTS
    // ============================================================

    #[tokio::test]
    async fn test_duplex_read_and_write_on_one_instance() {
        init_logger();
        let (left, right) = MemoryTransport::pair(TransportConfig::default());
        let left = Arc::new(left);

        // echo peer
        let echo = tokio::spawn(async move {
            let request = right.read(4, Timeout::Millis(500)).await?;
            right.write(&request, Timeout::Millis(500)).await?;
            Ok::<_, TransportError>(())
        });

        let reader = {
            let left = Arc::clone(&left);
            tokio::spawn(async move { left.read(4, Timeout::Millis(500)).await })
        };
        left.write(b"PING", Timeout::Millis(500)).await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), async {
            echo.await.unwrap().unwrap();
            reader.await.unwrap()
        })
        .await
        .expect("duplex exchange should not deadlock");
        assert_eq!(result.unwrap(), b"PING");
    }

    #[tokio::test]
    async fn test_concurrent_reads_are_serialized() {
        init_logger();
        let (left, right) = MemoryTransport::pair(TransportConfig::default());
        let right = Arc::new(right);

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let right = Arc::clone(&right);
                tokio::spawn(async move { right.read(2, Timeout::Millis(500)).await })
            })
            .collect();
        for _ in 0..4 {
            left.write(b"xy", Timeout::Millis(100)).await.unwrap();
        }

        for reader in readers {
            // each reader gets a whole, unsplit pair of bytes
            assert_eq!(reader.await.unwrap().unwrap(), b"xy");
        }
    }

    // ============================================================
    // SCOPED ACQUISITION TESTS
    // ============================================================

    #[derive(Default)]
    struct CloseCounter {
        closes: AtomicUsize,
        closed: AtomicBool,
        fail_close: AtomicBool,
    }

    struct CountingTransport {
        state: Arc<CloseCounter>,
    }

    impl Transport for CountingTransport {
        fn closed(&self) -> bool {
            self.state.closed.load(Ordering::SeqCst)
        }

        async fn read(&self, num_bytes: usize, _timeout: Timeout) -> TransportResult<Vec<u8>> {
            self.ensure_open()?;
            Ok(vec![0; num_bytes])
        }

        async fn write(&self, _data: &[u8], _timeout: Timeout) -> TransportResult<()> {
            self.ensure_open()
        }

        async fn close(&self) -> TransportResult<()> {
            self.state.closes.fetch_add(1, Ordering::SeqCst);
            self.state.closed.store(true, Ordering::SeqCst);
            if self.state.fail_close.load(Ordering::SeqCst) {
                return Err(TransportError::protocol("Transport encountered an error"));
            }
            Ok(())
        }
    }

    fn counting() -> (CountingTransport, Arc<CloseCounter>) {
        let state = Arc::new(CloseCounter::default());
        (
            CountingTransport {
                state: Arc::clone(&state),
            },
            state,
        )
    }

    #[tokio::test]
    async fn test_scoped_hands_out_same_instance_and_closes_once() {
        let (transport, state) = counting();
        let expected = Arc::clone(&state);

        let value = scoped(transport, async |t: &CountingTransport| -> TransportResult<usize> {
            assert!(Arc::ptr_eq(&t.state, &expected), "scope must yield the same transport");
            assert!(!t.closed());
            Ok(t.read(3, Timeout::Unspecified).await?.len())
        })
        .await
        .unwrap();

        assert_eq!(value, 3);
        assert_eq!(state.closes.load(Ordering::SeqCst), 1);
        assert!(state.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_scoped_closes_on_error_exit() {
        let (transport, state) = counting();

        let result = scoped(transport, async |t: &CountingTransport| -> TransportResult<()> {
            t.write(b"hi", Timeout::Millis(10)).await?;
            Err(TransportError::access_denied("Transport access denied"))
        })
        .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::AccessDenied);
        assert_eq!(state.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_scoped_closes_on_early_return() {
        let (transport, state) = counting();
        state.closed.store(true, Ordering::SeqCst);

        // the first operation fails, so `?` returns before the second runs
        let result = scoped(transport, async |t: &CountingTransport| -> TransportResult<()> {
            t.read(1, Timeout::Unspecified).await?;
            unreachable!("read on a closed transport must fail");
        })
        .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Closed);
        assert_eq!(state.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_scoped_reports_close_failure() {
        let (transport, state) = counting();
        state.fail_close.store(true, Ordering::SeqCst);

        let ok_body = scoped(transport, async |_t: &CountingTransport| -> TransportResult<u8> { Ok(1) }).await;
        assert_eq!(ok_body.unwrap_err().kind(), ErrorKind::Protocol);

        let (transport, state2) = counting();
        state2.fail_close.store(true, Ordering::SeqCst);
        let err_body = scoped(transport, async |_t: &CountingTransport| -> TransportResult<u8> {
            Err(TransportError::of_kind(ErrorKind::EndpointNotFound))
        })
        .await;
        // the body's error wins over the close failure
        assert_eq!(err_body.unwrap_err().kind(), ErrorKind::EndpointNotFound);
        assert_eq!(state.closes.load(Ordering::SeqCst), 1);
        assert_eq!(state2.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_scoped_memory_exchange() {
        init_logger();
        let (left, right) = MemoryTransport::pair(TransportConfig::default());

        right.write(b"OKAY", Timeout::Millis(50)).await.unwrap();
        let reply = scoped(left, async |t: &MemoryTransport| -> TransportResult<Vec<u8>> {
            t.write(b"OPEN", Timeout::Millis(50)).await?;
            t.read(4, Timeout::Millis(50)).await
        })
        .await
        .unwrap();

        assert_eq!(reply, b"OKAY");
        assert_eq!(right.read(4, Timeout::Millis(50)).await.unwrap(), b"OPEN");
        // the scoped end is gone, so the peer sees a disconnect
        let err = right.read(1, Timeout::Millis(50)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EndpointNotFound);
    }
}
