use crate::protocol::envelope::Envelope;
use crate::protocol::error::Result;

/// Encodes an envelope to its postcard wire representation.
///
/// The body bytes pass through untouched; the codec never inspects them.
pub fn encode_envelope(envelope: &Envelope) -> Result<Vec<u8>> {
    Ok(postcard::to_stdvec(envelope)?)
}

/// Decodes an envelope from its postcard wire representation.
pub fn decode_envelope(data: &[u8]) -> Result<Envelope> {
    Ok(postcard::from_bytes(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::envelope::{CommandKind, ResponseCode};

    #[test]
    fn test_request_round_trip() {
        let env = Envelope::request("compute", vec![1, 2, 3]);
        let decoded = decode_envelope(&encode_envelope(&env).unwrap()).unwrap();
        assert_eq!(decoded, env);
    }

    #[test]
    fn test_response_round_trip_keeps_code() {
        let env = Envelope::response(99, ResponseCode::ServerError, Vec::new());
        let decoded = decode_envelope(&encode_envelope(&env).unwrap()).unwrap();
        assert_eq!(decoded.kind, CommandKind::Response);
        assert_eq!(decoded.code, Some(ResponseCode::ServerError));
    }

    #[test]
    fn test_decode_rejects_truncated_frame() {
        let bytes = encode_envelope(&Envelope::heartbeat()).unwrap();
        assert!(decode_envelope(&bytes[..bytes.len() - 1]).is_err());
    }
}
