mod common;

use std::num::NonZeroUsize;

use collective::duplex_group;
use common::{Shard, temp_path};
use coordinator::{
    Checkpoint, EpochDriver, Master, ProvenanceChain, Role, TrainingError, Worker,
    provenance::{first_hash, next_hash},
};
use tokio::task::JoinSet;

fn epochs(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

#[tokio::test]
async fn every_member_ends_with_the_worker_average() {
    let path = temp_path("protocol-average");
    let mut tasks = JoinSet::new();

    for group in duplex_group(3).unwrap() {
        let path = path.clone();
        tasks.spawn(async move {
            let rank = group.rank();
            let role = match rank {
                0 => Role::Master(Master::new(
                    ProvenanceChain::new("a b".into(), "s".into()),
                    path,
                )),
                _ => Role::Worker(Worker),
            };

            let mut model = Shard::new(rank);
            let outcome = EpochDriver::new(group, role, &mut model, epochs(2))
                .run()
                .await
                .unwrap();

            (rank, model, outcome)
        });
    }

    let h0 = first_hash("a b", "s");
    let h1 = next_hash(&h0, 1, "s");

    while let Some(joined) = tasks.join_next().await {
        let (rank, model, outcome) = joined.unwrap();

        assert_eq!(model.params, vec![vec![1.5, 3.0], vec![15.0]]);
        assert_eq!(outcome.epochs, 2);
        assert_eq!(outcome.loss, 1.5);

        if rank == 0 {
            assert_eq!(model.trained, 0);
            assert_eq!(outcome.hash.as_deref(), Some(h1.as_str()));
            assert_eq!(outcome.checkpoint.as_deref(), Some(path.as_path()));
        } else {
            assert_eq!(model.trained, 2);
            assert_eq!(model.applied, 2);
            assert_eq!(outcome.hash, None);
            assert_eq!(outcome.checkpoint, None);
        }
    }

    let checkpoint = Checkpoint::load(&path).await.unwrap();
    assert_eq!(checkpoint.epoch, 2);
    assert_eq!(checkpoint.loss, 1.5);
    assert_eq!(checkpoint.hash, h1);
    assert_eq!(checkpoint.parameters, vec![vec![1.5, 3.0], vec![15.0]]);

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn single_worker_keeps_its_own_buffers() {
    let path = temp_path("protocol-single");
    let mut members = duplex_group(2).unwrap().into_iter();
    let (master_group, worker_group) = (members.next().unwrap(), members.next().unwrap());

    let mut master_model = Shard::new(0);
    let mut worker_model = Shard::new(1);

    let master = EpochDriver::new(
        master_group,
        Role::Master(Master::new(ProvenanceChain::new("x".into(), "k".into()), &path)),
        &mut master_model,
        epochs(1),
    );
    let worker = EpochDriver::new(
        worker_group,
        Role::Worker(Worker),
        &mut worker_model,
        epochs(1),
    );

    let (master, worker) = tokio::join!(master.run(), worker.run());
    let (master, worker) = (master.unwrap(), worker.unwrap());

    assert_eq!(master.epochs, 1);
    assert_eq!(worker.loss, 1.0);
    assert_eq!(master.hash, Some(first_hash("x", "k")));
    assert_eq!(master_model.params, vec![vec![1.0, 2.0], vec![10.0]]);
    assert_eq!(worker_model.params, master_model.params);

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn lost_worker_fails_the_run_without_a_checkpoint() {
    let path = temp_path("protocol-lost");
    let mut members = duplex_group(3).unwrap().into_iter();
    let master_group = members.next().unwrap();
    let worker_group = members.next().unwrap();
    drop(members);

    let mut master_model = Shard::new(0);
    let mut worker_model = Shard::new(1);

    let master = EpochDriver::new(
        master_group,
        Role::Master(Master::new(ProvenanceChain::new("a".into(), "s".into()), &path)),
        &mut master_model,
        epochs(2),
    );
    let worker = EpochDriver::new(
        worker_group,
        Role::Worker(Worker),
        &mut worker_model,
        epochs(2),
    );

    let (master, worker) = tokio::join!(master.run(), worker.run());

    assert!(matches!(master, Err(TrainingError::CollectiveTransport(_))));
    assert!(matches!(worker, Err(TrainingError::CollectiveTransport(_))));
    assert!(!path.exists());
}
