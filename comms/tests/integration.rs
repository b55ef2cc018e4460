use comms::msg::{Command, Msg, Payload};
use tokio::io;

#[tokio::test]
async fn join_request_reaches_the_master() -> io::Result<()> {
    let (worker_end, master_end) = io::duplex(128);

    let (rx, tx) = io::split(worker_end);
    let (_, mut tx) = comms::channel(rx, tx);
    tx.send(&Msg::Control(Command::Join {
        rank: 2,
        world_size: 3,
    }))
    .await?;

    let (rx, tx) = io::split(master_end);
    let (mut rx, _) = comms::channel(rx, tx);

    let Msg::Control(cmd) = rx.recv().await? else {
        panic!("expected a control message");
    };
    assert_eq!(
        cmd,
        Command::Join {
            rank: 2,
            world_size: 3
        }
    );
    Ok(())
}

#[tokio::test]
async fn buffers_larger_than_the_pipe_arrive_whole() -> io::Result<()> {
    const LEN: usize = 1000;

    let (one, two) = io::duplex(64);
    let (_, tx) = io::split(one);
    let (rx, _) = io::split(two);
    let (_, mut tx) = comms::channel(io::empty(), tx);
    let (mut rx, _) = comms::channel(rx, io::sink());

    let nums: Vec<f32> = (0..LEN).map(|i| i as f32 * 0.5).collect();

    let sender = async {
        tx.send(&Msg::Data(Payload::Buffer(&nums))).await?;
        tx.send(&Msg::Err("boom".into())).await
    };

    let receiver = async {
        let Msg::Data(Payload::Buffer(got)) = rx.recv().await? else {
            panic!("expected a buffer");
        };
        let got = got.to_vec();

        let Msg::Err(detail) = rx.recv().await? else {
            panic!("expected an error message");
        };
        assert_eq!(detail, "boom");
        Ok::<_, io::Error>(got)
    };

    let (_, got) = tokio::try_join!(sender, receiver)?;
    assert_eq!(got, nums);
    Ok(())
}

#[tokio::test]
async fn oversized_frames_are_refused_before_reading_them() -> io::Result<()> {
    let (one, two) = io::duplex(4096);
    let (_, tx) = io::split(one);
    let (rx, _) = io::split(two);
    let (_, mut tx) = comms::channel(io::empty(), tx);
    let (rx, _) = comms::channel(rx, io::sink());
    let mut rx = rx.with_max_frame_len(64);

    tx.send(&Msg::Data(Payload::Buffer(&[0.0; 32]))).await?;

    let err = rx.recv().await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    Ok(())
}

#[tokio::test]
async fn closed_stream_is_an_error() {
    let (one, two) = io::duplex(64);
    drop(one);

    let (rx, tx) = io::split(two);
    let (mut rx, _) = comms::channel(rx, tx);

    let err = rx.recv().await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
}
