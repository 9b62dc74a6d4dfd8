use bitcoin::address::{Address, NetworkUnchecked};
use bitcoin::script::{Script, ScriptBuf};
use bitcoin::CompressedPublicKey;

use crate::error::BtcError;
use crate::network::BtcNetwork;

/// Derive a P2WPKH (native SegWit bech32) address from a compressed public key.
///
/// Takes a 33-byte compressed secp256k1 public key and returns the address:
/// `bc1...` for mainnet, `tb1...` for testnet/signet.
pub fn pubkey_to_p2wpkh_address(
    pubkey_bytes: &[u8; 33],
    network: BtcNetwork,
) -> Result<Address, BtcError> {
    let compressed_pk = CompressedPublicKey::from_slice(pubkey_bytes).map_err(|e| {
        BtcError::InvalidKey(format!("failed to parse compressed public key: {e}"))
    })?;

    Ok(Address::p2wpkh(&compressed_pk, network.to_bitcoin_network()))
}

/// Parse a recipient address for the given network and return its scriptPubKey.
///
/// Supports P2PKH, P2SH, P2WPKH, P2WSH, and P2TR address formats. Any parse
/// failure or network mismatch is reported as `InvalidAddress`.
pub fn recipient_script(address: &str, network: BtcNetwork) -> Result<ScriptBuf, BtcError> {
    let parsed = address
        .trim()
        .parse::<Address<NetworkUnchecked>>()
        .map_err(|e| BtcError::InvalidAddress(format!("failed to parse address: {e}")))?;

    let checked = parsed
        .require_network(network.to_bitcoin_network())
        .map_err(|e| BtcError::InvalidAddress(format!("address not valid for {network}: {e}")))?;

    Ok(checked.script_pubkey())
}

/// Whether a script is an acceptable consolidation destination.
///
/// Only standard spendable templates qualify; OP_RETURN and bare scripts would
/// burn or strand the consolidated funds.
pub fn is_recipient_script(script: &Script) -> bool {
    script.is_p2pkh() || script.is_p2sh() || script.is_witness_program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::Secp256k1;

    const SATOSHI_PUBKEY_HEX: &str =
        "0279BE667EF9DCBBAC55A06295CE870B07029BFCDB2DCE28D959F2815B16F81798";

    fn generator_pubkey() -> [u8; 33] {
        hex::decode(SATOSHI_PUBKEY_HEX).unwrap().try_into().unwrap()
    }

    /// Well-known vector: the secp256k1 generator point as a compressed key.
    #[test]
    fn p2wpkh_mainnet_test_vector() {
        let address = pubkey_to_p2wpkh_address(&generator_pubkey(), BtcNetwork::Mainnet).unwrap();
        assert_eq!(address.to_string(), "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4");
    }

    #[test]
    fn p2wpkh_test_networks_start_with_tb1() {
        for net in [BtcNetwork::Testnet, BtcNetwork::Signet] {
            let address = pubkey_to_p2wpkh_address(&generator_pubkey(), net).unwrap();
            assert!(address.to_string().starts_with("tb1"), "got {address}");
        }
    }

    #[test]
    fn invalid_pubkey_returns_error() {
        let result = pubkey_to_p2wpkh_address(&[0u8; 33], BtcNetwork::Mainnet);
        assert!(matches!(result, Err(BtcError::InvalidKey(_))));
    }

    #[test]
    fn pubkey_from_secp256k1_roundtrip() {
        let secp = Secp256k1::new();
        let secret_key = bitcoin::secp256k1::SecretKey::from_slice(&[0xcd; 32]).unwrap();
        let public_key = bitcoin::secp256k1::PublicKey::from_secret_key(&secp, &secret_key);

        let address = pubkey_to_p2wpkh_address(&public_key.serialize(), BtcNetwork::Mainnet)
            .unwrap();
        assert!(address.to_string().starts_with("bc1q"));
        assert!(address.script_pubkey().is_p2wpkh());
    }

    #[test]
    fn recipient_script_for_p2wpkh() {
        let script =
            recipient_script("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4", BtcNetwork::Mainnet)
                .unwrap();
        assert_eq!(
            hex::encode(script.as_bytes()),
            "0014751e76e8199196d454941c45d1b3a323f1433bd6"
        );
        assert!(is_recipient_script(&script));
    }

    #[test]
    fn recipient_script_for_p2pkh() {
        // Satoshi's genesis coinbase address.
        let script =
            recipient_script("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", BtcNetwork::Mainnet).unwrap();
        assert!(script.is_p2pkh());
        assert!(is_recipient_script(&script));
    }

    #[test]
    fn recipient_script_tolerates_surrounding_whitespace() {
        let script = recipient_script(
            "  bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4\n",
            BtcNetwork::Mainnet,
        );
        assert!(script.is_ok());
    }

    #[test]
    fn mainnet_address_on_testnet_is_rejected() {
        let result =
            recipient_script("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4", BtcNetwork::Testnet);
        assert!(matches!(result, Err(BtcError::InvalidAddress(_))));
    }

    #[test]
    fn garbage_address_is_rejected() {
        let result = recipient_script("notanaddress!!!", BtcNetwork::Mainnet);
        assert!(matches!(result, Err(BtcError::InvalidAddress(_))));
    }

    #[test]
    fn op_return_is_not_a_recipient() {
        let script = ScriptBuf::builder()
            .push_opcode(bitcoin::opcodes::all::OP_RETURN)
            .into_script();
        assert!(!is_recipient_script(&script));
        assert!(!is_recipient_script(&ScriptBuf::new()));
    }
}
