// Macros that remove boilerplate from header-only CMPP messages
// (active test, terminate and their responses).

/// Macro for implementing codec traits on header-only messages (no body)
///
/// This macro generates complete Encodable/Decodable/Sequenced
/// implementations for messages that only contain the standard 12-byte
/// CMPP header.
///
/// # Arguments
/// * `$pdu_type` - The message struct name (e.g., ActiveTest)
/// * `$command_id` - The CommandId variant (e.g., CommandId::ActiveTest)
macro_rules! impl_header_only_pdu {
    ($pdu_type:ident, $command_id:expr) => {
        impl $crate::codec::Decodable for $pdu_type {
            fn command_id() -> $crate::datatypes::CommandId {
                $command_id
            }

            fn decode(
                header: $crate::codec::PduHeader,
                buf: &mut std::io::Cursor<&[u8]>,
            ) -> Result<Self, $crate::codec::CodecError> {
                use bytes::Buf;

                Self::validate_header(&header)?;

                // Some gateways append a reserved byte; skip whatever the
                // header says belongs to this frame.
                let body = (header.total_length as usize).saturating_sub($crate::codec::PduHeader::SIZE);
                buf.advance(body.min(buf.remaining()));

                Ok($pdu_type {
                    sequence_id: header.sequence_id,
                })
            }
        }

        impl $crate::codec::Encodable for $pdu_type {
            fn encode(&self, buf: &mut bytes::BytesMut) -> Result<(), $crate::codec::CodecError> {
                let header = $crate::codec::PduHeader {
                    total_length: $crate::codec::PduHeader::SIZE as u32,
                    command_id: $command_id,
                    sequence_id: self.sequence_id,
                };
                header.encode(buf)
            }

            fn encoded_size(&self) -> usize {
                $crate::codec::PduHeader::SIZE
            }
        }

        impl $crate::codec::Sequenced for $pdu_type {
            fn sequence_id(&self) -> u32 {
                self.sequence_id
            }
        }

        impl $pdu_type {
            pub fn new(sequence_id: u32) -> Self {
                Self { sequence_id }
            }
        }
    };
}

/// Macro for implementing `Sequenced` on messages with a `sequence_id` field
macro_rules! impl_sequenced {
    ($($pdu_type:ident),* $(,)?) => {
        $(
            impl $crate::codec::Sequenced for $pdu_type {
                fn sequence_id(&self) -> u32 {
                    self.sequence_id
                }
            }
        )*
    };
}

pub(crate) use {impl_header_only_pdu, impl_sequenced};
