use std::time::{Duration, Instant};

use fairsoil_gateway::ContractKind;
use serde::Serialize;

pub const SUCCESS_BANNER_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BannerKind {
    Error,
    Notice,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Banner {
    pub kind: BannerKind,
    pub message: String,
}

/// The single transient message shown above the page.
#[derive(Debug, Default)]
pub struct BannerSlot {
    current: Option<(Banner, Instant)>,
}

impl BannerSlot {
    pub fn show(&mut self, kind: BannerKind, message: impl Into<String>, now: Instant) {
        self.current = Some((
            Banner {
                kind,
                message: message.into(),
            },
            now,
        ));
    }

    pub fn dismiss(&mut self) {
        self.current = None;
    }

    /// Success banners disappear once they are older than [`SUCCESS_BANNER_TTL`].
    pub fn visible(&mut self, now: Instant) -> Option<Banner> {
        let expired = self.current.as_ref().is_some_and(|(banner, shown_at)| {
            banner.kind == BannerKind::Success
                && now.saturating_duration_since(*shown_at) >= SUCCESS_BANNER_TTL
        });
        if expired {
            self.current = None;
        }
        self.current.as_ref().map(|(banner, _)| banner.clone())
    }
}

/// Warning shown while a contract the page depends on has no address.
pub fn missing_addresses_warning(missing: &[ContractKind]) -> Option<String> {
    if missing.is_empty() {
        return None;
    }
    let names: Vec<&str> = missing.iter().map(|kind| kind.name()).collect();
    Some(format!(
        "Missing contract addresses ({}). Set FAIRSOIL_TOKENA_ADDRESS, FAIRSOIL_TOKENB_ADDRESS, \
         FAIRSOIL_TREASURY_ADDRESS and FAIRSOIL_COVENANT_ADDRESS.",
        names.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_expires_but_errors_stay() {
        let start = Instant::now();
        let mut slot = BannerSlot::default();
        slot.show(BannerKind::Success, "Template registered.", start);
        assert!(slot.visible(start + Duration::from_secs(4)).is_some());
        assert_eq!(slot.visible(start + Duration::from_secs(5)), None);

        slot.show(BannerKind::Error, "Insufficient Balance", start);
        let banner = slot.visible(start + Duration::from_secs(60)).expect("errors persist");
        assert_eq!(banner.kind, BannerKind::Error);
        slot.dismiss();
        assert_eq!(slot.visible(start), None);
    }

    #[test]
    fn warning_lists_missing_contracts() {
        assert_eq!(missing_addresses_warning(&[]), None);
        let warning = missing_addresses_warning(&[ContractKind::TokenB, ContractKind::Treasury])
            .expect("warning");
        assert!(warning.starts_with("Missing contract addresses (token B, treasury)."));
    }
}
