//! Property tests for the counting rendezvous.
//!
//! Releases and acquires are interleaved in random orders across tasks; the
//! gated party must proceed exactly when enough permits were released.

use std::time::Duration;

use pokerwire::{Rendezvous, RendezvousError};
use proptest::prelude::*;
use rstest::rstest;

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("failed to build tokio runtime")
}

proptest! {
    #[test]
    fn proceeds_only_with_enough_releases(
        releases in 0u32..6,
        required in 0u32..6,
        delays in proptest::collection::vec(0u64..50, 6),
    ) {
        let rt = paused_runtime();
        let outcome = rt.block_on(async {
            let rendezvous = Rendezvous::new("subscribed");
            for delay in delays.iter().take(releases as usize) {
                let releaser = rendezvous.clone();
                let delay = Duration::from_millis(*delay);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    releaser.release();
                });
            }
            let result = rendezvous
                .acquire_many("command", required, Duration::from_millis(100))
                .await;
            (result, rendezvous.acquired())
        });
        match outcome {
            (Ok(()), acquired) => {
                prop_assert!(releases >= required);
                prop_assert_eq!(acquired, u64::from(required));
            }
            (Err(RendezvousError::Stalled { acquired, required: wanted, .. }), _) => {
                prop_assert!(releases < required);
                prop_assert_eq!(acquired, releases);
                prop_assert_eq!(wanted, required);
            }
            (Err(other), _) => prop_assert!(false, "unexpected error: {other}"),
        }
    }

    #[test]
    fn releases_before_acquire_are_not_lost(parties in 1u32..8) {
        let rt = paused_runtime();
        let result = rt.block_on(async {
            let rendezvous = Rendezvous::new("subscribed");
            for _ in 0..parties {
                rendezvous.release();
            }
            rendezvous.acquire_many("command", parties, Duration::ZERO).await
        });
        prop_assert!(result.is_ok());
    }
}

#[rstest]
#[case::one_party(1)]
#[case::three_parties(3)]
#[tokio::test(start_paused = true)]
async fn late_release_still_stalls(#[case] parties: u32) {
    let rendezvous = Rendezvous::new("hand 1: deal:subscribed");
    let late = rendezvous.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        late.release();
    });
    let err = rendezvous
        .acquire_many("dealer", parties, Duration::from_secs(1))
        .await
        .expect_err("release arrived after the bound");
    assert!(err.to_string().contains("hand 1: deal:subscribed"));
    assert!(err.to_string().contains("dealer"));
}
