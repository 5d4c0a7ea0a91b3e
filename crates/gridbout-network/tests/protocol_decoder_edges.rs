use bytes::{BufMut, BytesMut};
use gridbout_network::protocol::{FramedCodec, Message};

#[test]
fn empty_buffer_needs_more_data() {
    let mut buf = BytesMut::new();
    assert!(FramedCodec::decode(&mut buf).unwrap().is_none());
}

#[test]
fn short_length_prefix_needs_more_data() {
    let mut buf = BytesMut::from(&[0u8, 0][..]);
    assert!(FramedCodec::decode(&mut buf).unwrap().is_none());
    // The prefix bytes stay in the buffer for the next read
    assert_eq!(buf.len(), 2);
}

#[test]
fn truncated_body_needs_more_data() {
    let mut full = BytesMut::new();
    FramedCodec::encode(&Message::GameOver, &mut full).unwrap();

    let mut buf = BytesMut::from(&full[..full.len() - 1]);
    assert!(FramedCodec::decode(&mut buf).unwrap().is_none());
}

#[test]
fn garbage_body_is_a_protocol_error_not_a_panic() {
    let mut buf = BytesMut::new();
    let body = [0xFFu8; 16];
    buf.put_u32(body.len() as u32);
    buf.extend_from_slice(&body);

    let result = FramedCodec::decode(&mut buf);
    assert!(result.is_err());
}

#[test]
fn valid_frame_after_consumed_garbage_still_decodes() {
    let mut buf = BytesMut::new();

    // One garbage frame...
    let body = [0xABu8; 8];
    buf.put_u32(body.len() as u32);
    buf.extend_from_slice(&body);
    // ...followed by a real one
    FramedCodec::encode(&Message::PlayerReady, &mut buf).unwrap();

    assert!(FramedCodec::decode(&mut buf).is_err());
    // The bad frame was consumed; the stream recovers
    assert!(matches!(
        FramedCodec::decode(&mut buf).unwrap().unwrap(),
        Message::PlayerReady
    ));
}
