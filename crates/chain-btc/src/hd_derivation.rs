use bip32::{ChildNumber, ExtendedKey, XPub};
use bitcoin::script::ScriptBuf;

use crate::address::pubkey_to_p2wpkh_address;
use crate::error::BtcError;
use crate::network::BtcNetwork;

/// BIP-84 receiving addresses live on the external chain: account/0/index.
const EXTERNAL_CHAIN: u32 = 0;

/// Indices at or above this value are hardened and need the private key.
const HARDENED_FLAG: u32 = 0x8000_0000;

/// Watch-only derivation context built from an account-level extended public key.
///
/// The external chain key is derived once at construction; every address after
/// that is a single non-hardened public derivation step. The value is immutable
/// and can be shared freely between concurrent builds.
#[derive(Clone)]
pub struct ExtendedPublicKey {
    network: BtcNetwork,
    prefix: String,
    depth: u8,
    external: XPub,
}

/// A receiving address at a fixed index on the external chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedAddress {
    pub index: u32,
    pub script_pubkey: ScriptBuf,
    pub address: String,
}

impl ExtendedPublicKey {
    /// Parse a base58check extended public key (`zpub`, `vpub`, `xpub`, `tpub`).
    ///
    /// Private keys, non-native-SegWit versions (`ypub`, `upub`, ...) and keys
    /// belonging to the other network class are rejected.
    pub fn parse(encoded: &str, network: BtcNetwork) -> Result<Self, BtcError> {
        let extended: ExtendedKey = encoded
            .trim()
            .parse()
            .map_err(|e: bip32::Error| BtcError::InvalidKey(format!("malformed key: {e}")))?;

        let prefix = extended.prefix.as_str().to_string();
        let key_is_mainnet = prefix_network_class(&prefix)?;
        if key_is_mainnet != network.is_mainnet() {
            return Err(BtcError::InvalidKey(format!(
                "{prefix} key cannot be used on {network}"
            )));
        }

        let depth = extended.attrs.depth;
        let account = XPub::try_from(extended)
            .map_err(|e| BtcError::InvalidKey(format!("not a public key: {e}")))?;

        let external = account
            .derive_child(non_hardened(EXTERNAL_CHAIN)?)
            .map_err(|e| BtcError::InvalidKey(format!("external chain derivation failed: {e}")))?;

        tracing::debug!(%prefix, depth, %network, "loaded extended public key");

        Ok(Self {
            network,
            prefix,
            depth,
            external,
        })
    }

    pub fn network(&self) -> BtcNetwork {
        self.network
    }

    /// Four-character version prefix the key was encoded with.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Depth of the supplied key (3 for a BIP-84 account key).
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Derive the receiving address at `index` (path account/0/index).
    pub fn derive_address(&self, index: u32) -> Result<DerivedAddress, BtcError> {
        let child = self
            .external
            .derive_child(non_hardened(index)?)
            .map_err(|e| BtcError::InvalidKey(format!("derivation failed at index {index}: {e}")))?;

        let address = pubkey_to_p2wpkh_address(&child.to_bytes(), self.network)?;

        Ok(DerivedAddress {
            index,
            script_pubkey: address.script_pubkey(),
            address: address.to_string(),
        })
    }

    /// Derive receiving addresses for indices `0..count`, in index order.
    pub fn derive_range(&self, count: u32) -> Result<Vec<DerivedAddress>, BtcError> {
        (0..count).map(|index| self.derive_address(index)).collect()
    }
}

impl std::fmt::Debug for ExtendedPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtendedPublicKey")
            .field("network", &self.network)
            .field("prefix", &self.prefix)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

/// Returns `true` for mainnet prefixes and `false` for test-network prefixes.
fn prefix_network_class(prefix: &str) -> Result<bool, BtcError> {
    match prefix {
        "zpub" | "xpub" => Ok(true),
        "vpub" | "tpub" => Ok(false),
        p if p.ends_with("prv") => Err(BtcError::InvalidKey(
            "private extended keys are not accepted; export the account public key".into(),
        )),
        other => Err(BtcError::InvalidKey(format!(
            "unsupported key version '{other}', expected a native SegWit zpub or vpub"
        ))),
    }
}

fn non_hardened(index: u32) -> Result<ChildNumber, BtcError> {
    if index >= HARDENED_FLAG {
        return Err(BtcError::Validation(format!(
            "index {index} is hardened and cannot be derived from a public key"
        )));
    }
    ChildNumber::new(index, false).map_err(|e| BtcError::Validation(e.to_string()))
}
