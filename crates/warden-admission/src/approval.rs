//! Gate 6, approval for destructive actions: for a destructive action issued
//! in `FULL_ENFORCE`, `approval_id` must be non-empty and signed by a
//! trusted key distinct from `signing_key_id`.
//!
//! `approval_id` is the compact form `<key_id>:<hex signature>`, the
//! approver's detached Ed25519 signature over the same canonical payload the
//! issuer signed. This encoding is this core's own choice, recorded in
//! `DESIGN.md`.

use warden_crypto::Signature;
use warden_policy::KeyDirectory;
use warden_types::{Command, RejectionKind};

pub fn check_approval(command: &Command, keys: &KeyDirectory) -> Result<(), RejectionKind> {
    if !command.action_type.is_destructive() || command.tre_mode != warden_types::TreMode::FullEnforce
    {
        return Ok(());
    }

    let approval_id = match &command.approval_id {
        Some(id) if !id.is_empty() => id,
        _ => return Err(RejectionKind::ApprovalMissing),
    };

    let (approver_key_id, signature_hex) = approval_id
        .split_once(':')
        .ok_or(RejectionKind::ApprovalMissing)?;

    if approver_key_id == command.signing_key_id {
        return Err(RejectionKind::ApprovalMissing);
    }

    let approver_key = keys
        .get(approver_key_id)
        .ok_or(RejectionKind::ApprovalMissing)?;

    let signature =
        Signature::from_hex(signature_hex).map_err(|_| RejectionKind::ApprovalMissing)?;
    let payload = command
        .raw
        .signed_payload()
        .map_err(|_| RejectionKind::ApprovalMissing)?;

    approver_key
        .public_key
        .verify(&payload, &signature)
        .map_err(|_| RejectionKind::ApprovalMissing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use warden_crypto::SecretKey;
    use warden_policy::TrustedKey;
    use warden_types::{RawCommand, Role};

    fn sample_raw(approval_id: Option<String>) -> RawCommand {
        RawCommand {
            command_id: Uuid::new_v4(),
            action_type: "ISOLATE_HOST".into(),
            target: serde_json::json!({"interface": null}),
            incident_id: Uuid::new_v4(),
            tre_mode: "FULL_ENFORCE".into(),
            issued_by_user_id: "analyst-1".into(),
            issued_by_role: "SECURITY_ANALYST".into(),
            issued_at: chrono::Utc::now(),
            expires_at: chrono::Utc::now() + chrono::Duration::minutes(5),
            rollback_token: "00".repeat(32),
            approval_id,
            signature: "deadbeef".into(),
            signing_key_id: "issuer-key".into(),
            signing_algorithm: "ed25519".into(),
            signed_at: chrono::Utc::now(),
        }
    }

    fn validated(raw: RawCommand) -> Command {
        Command::validate(raw).unwrap()
    }

    #[test]
    fn missing_approval_is_rejected() {
        let command = validated(sample_raw(None));
        let keys = KeyDirectory::empty();
        assert!(check_approval(&command, &keys).is_err());
    }

    #[test]
    fn approval_from_the_issuing_key_itself_is_rejected() {
        let approver = SecretKey::generate();
        let raw = sample_raw(None);
        let command = validated(raw.clone());
        let payload = command.raw.signed_payload().unwrap();
        let sig = approver.sign(&payload);

        let mut keys = KeyDirectory::empty();
        keys.insert(TrustedKey {
            key_id: "issuer-key".into(),
            public_key: approver.public_key(),
            attested_role: Role::SecurityAnalyst,
        });

        let raw_with_approval = sample_raw(Some(format!("issuer-key:{}", sig.to_hex())));
        let command = validated(raw_with_approval);
        assert!(check_approval(&command, &keys).is_err());
    }

    #[test]
    fn valid_distinct_approver_signature_is_accepted() {
        let approver = SecretKey::generate();
        let raw = sample_raw(None);
        let command = validated(raw);
        let payload = command.raw.signed_payload().unwrap();
        let sig = approver.sign(&payload);

        let mut keys = KeyDirectory::empty();
        keys.insert(TrustedKey {
            key_id: "approver-key".into(),
            public_key: approver.public_key(),
            attested_role: Role::SuperAdmin,
        });

        let raw_with_approval = sample_raw(Some(format!("approver-key:{}", sig.to_hex())));
        let command = validated(raw_with_approval);
        assert!(check_approval(&command, &keys).is_ok());
    }

    #[test]
    fn non_destructive_actions_never_require_approval() {
        let mut raw = sample_raw(None);
        raw.action_type = "BLOCK_PROCESS".into();
        raw.target = serde_json::json!({"pid": 1, "image_hash": "ab"});
        let command = validated(raw);
        let keys = KeyDirectory::empty();
        assert!(check_approval(&command, &keys).is_ok());
    }
}
