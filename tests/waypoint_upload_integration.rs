//! Waypoint upload state machine driven end-to-end through the wire codec,
//! simulating the vehicle requesting items one at a time (§4.10, §8).

use anyhow::Result;
use gcproxy::codec::{FrameCodec, SimpleCodec, WireMessage};
use gcproxy::waypoint::{UploadRequestOutcome, Waypoint, WaypointLoader};

fn wp(seq: u16) -> Waypoint {
    Waypoint {
        seq,
        x: 1.0,
        y: 2.0,
        z: 3.0,
        command: 16,
    }
}

#[tokio::test]
async fn upload_drains_in_order_through_real_frame_encoding() -> Result<()> {
    let mut loader = WaypointLoader::default();
    loader.begin_upload(vec![wp(0), wp(1), wp(2)]);

    let codec = SimpleCodec::new();
    let mut sent_items = Vec::new();

    for seq in 0..3u16 {
        match loader.on_request(seq) {
            UploadRequestOutcome::Send { seq, done } => {
                let item = loader.wp(seq).cloned().expect("requested seq must exist");
                let frame = gcproxy::codec::Frame {
                    src_system: 255,
                    src_component: 0,
                    usec: None,
                    body: WireMessage::Waypoint {
                        seq: item.seq,
                        x: item.x,
                        y: item.y,
                        z: item.z,
                        command: item.command,
                    },
                };
                let bytes = codec.encode(&frame)?;
                let mut decoder = SimpleCodec::new();
                let decoded = decoder.feed(&bytes);
                assert_eq!(decoded.len(), 1);
                sent_items.push(seq);
                if done {
                    assert_eq!(seq, 2);
                }
            }
            other => panic!("expected Send, got a different outcome for seq {seq}: {other:?}"),
        }
    }

    assert_eq!(sent_items, vec![0, 1, 2]);
    assert!(!loader.is_uploading());
    Ok(())
}
