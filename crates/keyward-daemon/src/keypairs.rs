//! Keypair generation, the daemon's progress-tracked operation.
//!
//! Budget: one unit on the root for the whole operation, two per key kind
//! (generated, checked).

use anyhow::{Context, Result, bail};
use base64::Engine;
use k256::SecretKey;
use k256::ecdh::diffie_hellman;
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use keyward_observer::Notifier;
use keyward_protocol::EventKind;
use keyward_protocol::api::{GeneratedKeypairs, KeypairKind, PublicKeypair};
use rand::rngs::OsRng;

/// Units the caller must reserve on the root notifier.
pub const ROOT_BUDGET: u64 = 1;

const STEP_BUDGET: u64 = 2;

/// Generate one keypair per [`KeypairKind`] for `org_id`, reporting progress
/// on `root`. Failures are reported as an error event before being returned.
///
/// CPU bound; run it on a blocking thread.
pub fn generate(root: &Notifier, org_id: &str) -> Result<GeneratedKeypairs> {
    report_failure(root, || generate_all(root, org_id))
}

/// Run `op`, emitting an [`EventKind::Error`] event on `root` if it fails.
fn report_failure<T>(root: &Notifier, op: impl FnOnce() -> Result<T>) -> Result<T> {
    op().inspect_err(|err| root.notify(EventKind::Error, format!("{err:#}"), false))
}

fn generate_all(root: &Notifier, org_id: &str) -> Result<GeneratedKeypairs> {
    // Reserve every step before the first event so the total never moves.
    let steps: Vec<(KeypairKind, Notifier)> = KeypairKind::ALL
        .into_iter()
        .map(|kind| (kind, root.child(STEP_BUDGET)))
        .collect();
    root.notify(
        EventKind::Progress,
        format!("generating keypairs for org {org_id}"),
        false,
    );

    let mut keypairs = Vec::with_capacity(steps.len());
    for (kind, step) in &steps {
        let public_key = match kind {
            KeypairKind::Signing => signing_keypair(step, org_id)?,
            KeypairKind::Encryption => encryption_keypair(step)?,
        };
        keypairs.push(PublicKeypair {
            kind: *kind,
            public_key,
        });
    }

    root.notify(EventKind::Progress, "keypairs generated", true);
    Ok(GeneratedKeypairs {
        org_id: org_id.to_string(),
        keypairs,
    })
}

fn signing_keypair(step: &Notifier, org_id: &str) -> Result<String> {
    let secret = SecretKey::random(&mut OsRng);
    let public = secret.public_key();
    step.notify(EventKind::Progress, "signing keypair generated", true);

    let signing_key =
        SigningKey::from_slice(&secret.to_bytes()).context("failed to construct signing key")?;
    let sig: Signature = signing_key.sign(org_id.as_bytes());
    VerifyingKey::from(public)
        .verify(org_id.as_bytes(), &sig)
        .context("signing keypair failed its self-signature check")?;
    step.notify(EventKind::Progress, "signing keypair self-signed", true);

    Ok(base64::engine::general_purpose::STANDARD.encode(public.to_sec1_bytes()))
}

fn encryption_keypair(step: &Notifier) -> Result<String> {
    let secret = SecretKey::random(&mut OsRng);
    let public = secret.public_key();
    step.notify(EventKind::Progress, "encryption keypair generated", true);

    let peer = SecretKey::random(&mut OsRng);
    let ours = diffie_hellman(secret.to_nonzero_scalar(), peer.public_key().as_affine());
    let theirs = diffie_hellman(peer.to_nonzero_scalar(), public.as_affine());
    if ours.raw_secret_bytes() != theirs.raw_secret_bytes() {
        bail!("encryption keypair failed its key-agreement check");
    }
    step.notify(EventKind::Progress, "encryption keypair checked", true);

    Ok(base64::engine::general_purpose::STANDARD.encode(public.to_sec1_bytes()))
}
