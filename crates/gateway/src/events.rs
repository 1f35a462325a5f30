use alloy_primitives::B256;
use alloy_sol_types::SolEvent;
use fairsoil_types::{DecodedLog, EventArg, EventArgs};
use tracing::warn;

use crate::RawLog;
use crate::abi::{ICovenant, ITreasury};

type DecodeFn = fn(&RawLog) -> Result<EventArgs, alloy_sol_types::Error>;

struct EventDecoder {
    name: &'static str,
    signature: B256,
    decode: DecodeFn,
}

macro_rules! event_decoder {
    ($name:literal, $event:ty, |$decoded:ident| { $($field:literal => $value:expr),* $(,)? }) => {
        EventDecoder {
            name: $name,
            signature: <$event as SolEvent>::SIGNATURE_HASH,
            decode: |log: &RawLog| {
                let $decoded =
                    <$event as SolEvent>::decode_raw_log(log.topics.iter().copied(), &log.data)?;
                let mut args = EventArgs::new();
                $( args.insert($field.to_string(), $value); )*
                Ok(args)
            },
        }
    };
}

static DECODERS: [EventDecoder; 20] = [
    event_decoder!("CovenantCreated", ICovenant::CovenantCreated, |event| {
        "covenantId" => EventArg::Uint(event.covenantId),
        "creator" => EventArg::Address(event.creator),
        "worker" => EventArg::Address(event.worker),
        "tokenBReward" => EventArg::Uint(event.tokenBReward),
        "integrityPoints" => EventArg::Uint(event.integrityPoints),
    }),
    event_decoder!("CovenantSubmitted", ICovenant::CovenantSubmitted, |event| {
        "covenantId" => EventArg::Uint(event.covenantId),
        "worker" => EventArg::Address(event.worker),
    }),
    event_decoder!("CovenantApproved", ICovenant::CovenantApproved, |event| {
        "covenantId" => EventArg::Uint(event.covenantId),
        "creator" => EventArg::Address(event.creator),
    }),
    event_decoder!("CovenantRejected", ICovenant::CovenantRejected, |event| {
        "covenantId" => EventArg::Uint(event.covenantId),
        "creator" => EventArg::Address(event.creator),
    }),
    event_decoder!("CovenantCancelled", ICovenant::CovenantCancelled, |event| {
        "covenantId" => EventArg::Uint(event.covenantId),
        "creator" => EventArg::Address(event.creator),
    }),
    event_decoder!("IssueReported", ICovenant::IssueReported, |event| {
        "covenantId" => EventArg::Uint(event.covenantId),
        "worker" => EventArg::Address(event.worker),
        "claimBps" => EventArg::Uint(event.claimBps),
        "reason" => EventArg::Text(event.reason),
        "evidenceUri" => EventArg::Text(event.evidenceUri),
    }),
    event_decoder!("IssueAccepted", ICovenant::IssueAccepted, |event| {
        "covenantId" => EventArg::Uint(event.covenantId),
        "creator" => EventArg::Address(event.creator),
        "claimBps" => EventArg::Uint(event.claimBps),
    }),
    event_decoder!("IssueDisputed", ICovenant::IssueDisputed, |event| {
        "covenantId" => EventArg::Uint(event.covenantId),
        "creator" => EventArg::Address(event.creator),
        "reason" => EventArg::Text(event.reason),
        "evidenceUri" => EventArg::Text(event.evidenceUri),
    }),
    event_decoder!("DisputeResolverSet", ICovenant::DisputeResolverSet, |event| {
        "resolver" => EventArg::Address(event.resolver),
    }),
    event_decoder!("ResolutionProposed", ICovenant::ResolutionProposed, |event| {
        "covenantId" => EventArg::Uint(event.covenantId),
        "workerPayoutBps" => EventArg::Uint(event.workerPayoutBps),
        "integrityPoints" => EventArg::Uint(event.integrityPoints),
        "slashingPenalty" => EventArg::Uint(event.slashingPenalty),
    }),
    event_decoder!("MaliceSlashed", ICovenant::MaliceSlashed, |event| {
        "covenantId" => EventArg::Uint(event.covenantId),
        "creator" => EventArg::Address(event.creator),
        "worker" => EventArg::Address(event.worker),
        "penalty" => EventArg::Uint(event.penalty),
    }),
    event_decoder!("DisputeResolved", ICovenant::DisputeResolved, |event| {
        "covenantId" => EventArg::Uint(event.covenantId),
        "workerPayoutBps" => EventArg::Uint(event.workerPayoutBps),
        "integrityPoints" => EventArg::Uint(event.integrityPoints),
        "slashingPenalty" => EventArg::Uint(event.slashingPenalty),
    }),
    event_decoder!("UBIClaimed", ITreasury::UBIClaimed, |event| {
        "user" => EventArg::Address(event.user),
        "amount" => EventArg::Uint(event.amount),
    }),
    event_decoder!("TaskCompleted", ITreasury::TaskCompleted, |event| {
        "worker" => EventArg::Address(event.worker),
        "tokenBReward" => EventArg::Uint(event.tokenBReward),
        "integrityPoints" => EventArg::Uint(event.integrityPoints),
    }),
    event_decoder!("CovenantSet", ITreasury::CovenantSet, |event| {
        "covenant" => EventArg::Address(event.covenant),
    }),
    event_decoder!("TreasuryIn", ITreasury::TreasuryIn, |event| {
        "from" => EventArg::Address(event.from),
        "amount" => EventArg::Uint(event.amount),
        "reason" => EventArg::Word(event.reason),
    }),
    event_decoder!("TreasuryOutA", ITreasury::TreasuryOutA, |event| {
        "to" => EventArg::Address(event.to),
        "amount" => EventArg::Uint(event.amount),
        "reason" => EventArg::Word(event.reason),
    }),
    event_decoder!("TreasuryOutB", ITreasury::TreasuryOutB, |event| {
        "to" => EventArg::Address(event.to),
        "amount" => EventArg::Uint(event.amount),
        "reason" => EventArg::Word(event.reason),
    }),
    event_decoder!("ReserveSnapshot", ITreasury::ReserveSnapshot, |event| {
        "reservesA" => EventArg::Uint(event.reservesA),
        "reservesB" => EventArg::Uint(event.reservesB),
    }),
    event_decoder!("LiabilityChanged", ITreasury::LiabilityChanged, |event| {
        "deltaA" => EventArg::Int(event.deltaA),
        "deltaB" => EventArg::Int(event.deltaB),
        "reason" => EventArg::Word(event.reason),
    }),
];

/// Names and topic0 hashes of every event the dashboard understands.
pub fn event_signatures() -> impl Iterator<Item = (&'static str, B256)> {
    DECODERS
        .iter()
        .map(|decoder| (decoder.name, decoder.signature))
}

/// Decodes a raw log. Unknown topics, and known topics whose payload does
/// not match the ABI, come back with no event name.
pub fn decode_log(log: &RawLog) -> DecodedLog {
    let undecoded = DecodedLog {
        event_name: None,
        args: EventArgs::new(),
        address: log.address,
        block_number: log.block_number,
        transaction_hash: log.transaction_hash,
        log_index: log.log_index,
    };
    let Some(topic0) = log.topics.first() else {
        return undecoded;
    };
    let Some(decoder) = DECODERS
        .iter()
        .find(|decoder| decoder.signature == *topic0)
    else {
        return undecoded;
    };
    match (decoder.decode)(log) {
        Ok(args) => DecodedLog {
            event_name: Some(decoder.name.to_string()),
            args,
            ..undecoded
        },
        Err(error) => {
            warn!(
                event = decoder.name,
                block = log.block_number,
                %error,
                "log matched a known event but failed to decode"
            );
            undecoded
        }
    }
}

pub fn decode_logs(logs: &[RawLog]) -> Vec<DecodedLog> {
    logs.iter().map(decode_log).collect()
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, Bytes, U256};

    use super::*;

    fn raw_from<E: SolEvent>(event: &E, block_number: u64) -> RawLog {
        let data = event.encode_log_data();
        RawLog {
            address: Address::repeat_byte(0xcc),
            topics: data.topics().to_vec(),
            data: data.data.clone(),
            block_number,
            transaction_hash: Some(B256::repeat_byte(0x01)),
            log_index: Some(4),
        }
    }

    #[test]
    fn decodes_covenant_created() {
        let event = ICovenant::CovenantCreated {
            covenantId: U256::from(7_u64),
            creator: Address::repeat_byte(0x01),
            worker: Address::repeat_byte(0x02),
            tokenBReward: U256::from(500_u64),
            integrityPoints: U256::from(10_u64),
        };
        let decoded = decode_log(&raw_from(&event, 12));
        assert_eq!(decoded.event_name.as_deref(), Some("CovenantCreated"));
        assert_eq!(decoded.block_number, 12);
        assert_eq!(decoded.uint("covenantId"), U256::from(7_u64));
        assert_eq!(decoded.uint("tokenBReward"), U256::from(500_u64));
        assert_eq!(
            decoded.address_arg("worker"),
            Some(Address::repeat_byte(0x02))
        );
        assert_eq!(decoded.log_index, Some(4));
    }

    #[test]
    fn decodes_string_and_word_arguments() {
        let reported = ICovenant::IssueReported {
            covenantId: U256::from(1_u64),
            worker: Address::repeat_byte(0x02),
            claimBps: U256::from(2_500_u64),
            reason: "late".to_string(),
            evidenceUri: "https://example.org/e".to_string(),
        };
        let decoded = decode_log(&raw_from(&reported, 3));
        assert_eq!(decoded.text("reason").as_deref(), Some("late"));
        assert_eq!(
            decoded.text("evidenceUri").as_deref(),
            Some("https://example.org/e")
        );

        let inflow = ITreasury::TreasuryIn {
            from: Address::repeat_byte(0x03),
            amount: U256::from(1_u64),
            reason: B256::repeat_byte(0xab),
        };
        let decoded = decode_log(&raw_from(&inflow, 4));
        assert_eq!(decoded.event_name.as_deref(), Some("TreasuryIn"));
        assert!(
            decoded
                .text("reason")
                .expect("word reason")
                .starts_with("0xabab")
        );
    }

    #[test]
    fn unknown_topic_and_missing_topic_decode_to_unnamed_logs() {
        let unknown = RawLog {
            address: Address::ZERO,
            topics: vec![B256::repeat_byte(0x99)],
            data: Bytes::new(),
            block_number: 1,
            transaction_hash: None,
            log_index: None,
        };
        assert_eq!(decode_log(&unknown).event_name, None);

        let anonymous = RawLog {
            topics: Vec::new(),
            ..unknown
        };
        assert_eq!(decode_log(&anonymous).event_name, None);
    }

    #[test]
    fn truncated_payload_is_not_named() {
        let event = ITreasury::UBIClaimed {
            user: Address::repeat_byte(0x05),
            amount: U256::from(3_u64),
        };
        let mut raw = raw_from(&event, 2);
        raw.data = Bytes::new();
        assert_eq!(decode_log(&raw).event_name, None);
    }

    #[test]
    fn signatures_are_unique() {
        let mut seen: Vec<B256> = event_signatures().map(|(_, hash)| hash).collect();
        let total = seen.len();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), total);
        assert_eq!(total, 20);
    }
}
