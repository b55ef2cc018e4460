mod common;

use common::{Shard, temp_path};
use coordinator::{Checkpoint, CheckpointErr, CheckpointWriter, LocalModel};

#[tokio::test]
async fn checkpoint_reads_back_what_was_saved() {
    let path = temp_path("checkpoint-roundtrip");
    let mut model = Shard::new(3);
    model.train_epoch(0).unwrap();

    let writer = CheckpointWriter::new(&path);
    writer.save(7, &model, 0.125, "abc123").await.unwrap();

    let checkpoint = Checkpoint::load(&path).await.unwrap();
    assert_eq!(checkpoint.epoch, 7);
    assert_eq!(checkpoint.loss, 0.125);
    assert_eq!(checkpoint.hash, "abc123");
    assert_eq!(checkpoint.parameters, model.params);

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn parameters_keep_their_exact_bits() {
    let path = temp_path("checkpoint-bits");
    let mut model = Shard::new(0);
    model.params = vec![
        vec![-0.0, f32::MIN_POSITIVE, f32::MAX, 1.0e-40, -3.5],
        vec![],
    ];

    CheckpointWriter::new(&path)
        .save(1, &model, 0.5, "h")
        .await
        .unwrap();

    let checkpoint = Checkpoint::load(&path).await.unwrap();
    assert_eq!(checkpoint.parameters.len(), 2);
    assert!(checkpoint.parameters[1].is_empty());
    let bits = |xs: &[f32]| xs.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(&checkpoint.parameters[0]), bits(&model.params[0]));

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn saving_again_replaces_the_checkpoint() {
    let path = temp_path("checkpoint-replace");
    let writer = CheckpointWriter::new(&path);

    let mut model = Shard::new(1);
    model.train_epoch(0).unwrap();
    writer.save(1, &model, 1.0, "first").await.unwrap();

    let mut model = Shard::new(2);
    model.train_epoch(0).unwrap();
    writer.save(2, &model, 2.0, "second").await.unwrap();

    let checkpoint = Checkpoint::load(&path).await.unwrap();
    assert_eq!(checkpoint.epoch, 2);
    assert_eq!(checkpoint.hash, "second");
    assert_eq!(checkpoint.parameters, vec![vec![2.0, 4.0], vec![20.0]]);

    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    let leftover = path.with_file_name(format!(".{name}.tmp"));
    assert!(!leftover.exists());

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn missing_directories_are_created() {
    let dir = temp_path("checkpoint-dir").with_extension("d");
    let _ = std::fs::remove_dir_all(&dir);
    let path = dir.join("nested").join("final.safetensors");

    CheckpointWriter::new(&path)
        .save(1, &Shard::new(0), 0.0, "h")
        .await
        .unwrap();

    assert!(path.exists());
    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn garbage_is_not_a_checkpoint() {
    let path = temp_path("checkpoint-garbage");
    std::fs::write(&path, b"definitely not safetensors").unwrap();

    let err = Checkpoint::load(&path).await.unwrap_err();
    assert!(matches!(err, CheckpointErr::Format(_)));

    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn missing_file_is_an_io_error() {
    let path = temp_path("checkpoint-missing");
    let err = Checkpoint::load(&path).await.unwrap_err();
    assert!(matches!(err, CheckpointErr::Io(_)));
}
