//! Token registry
//!
//! The default list for the configured chain plus user-imported tokens.

use alloy_primitives::Address;
use evm_client::{queries, EvmClient};
use twinroute_core::{lowercase_hex, ChainConfig, ProtocolError, Token};

use crate::state::AmmError;

/// Well-known mainnet tokens: (symbol, name, address, decimals)
const MAINNET_TOKENS: &[(&str, &str, &str, u8)] = &[
    ("USDC", "USD Coin", "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48", 6),
    ("USDT", "Tether USD", "0xdac17f958d2ee523a2206206994597c13d831ec7", 6),
    ("DAI", "Dai Stablecoin", "0x6b175474e89094c44da98b954eedeac495271d0f", 18),
    ("WBTC", "Wrapped BTC", "0x2260fac5e5542a773aa44fbcfedf7c193bc2c599", 8),
    ("UNI", "Uniswap", "0x1f9840a85d5af5bf1d1762f925bdaddc4201f984", 18),
    ("SUSHI", "SushiToken", "0x6b3595068778dd592e39a122f4f5a5cf09c90fe2", 18),
];

#[derive(Debug, Clone)]
pub struct TokenRegistry {
    tokens: Vec<Token>,
}

impl TokenRegistry {
    /// Native coin, wrapped native, and the chain's default list
    pub fn with_defaults(chain: &ChainConfig) -> Result<Self, AmmError> {
        let native = Token::from_parts(
            chain.native_symbol.clone(),
            chain.native_name.clone(),
            chain.native_sentinel,
            18,
        )
        .map_err(protocol_err)?;
        let wrapped = Token::from_parts(
            chain.wrapped_symbol.clone(),
            format!("Wrapped {}", chain.native_name),
            chain.wrapped_native,
            18,
        )
        .map_err(protocol_err)?;

        let mut tokens = vec![native, wrapped];
        if chain.chain_id == 1 {
            for (symbol, name, address, decimals) in MAINNET_TOKENS {
                tokens.push(Token::new(*symbol, *name, address, *decimals).map_err(protocol_err)?);
            }
        }
        Ok(Self { tokens })
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn by_address(&self, address: Address) -> Option<&Token> {
        self.tokens.iter().find(|t| t.address == address)
    }

    /// Case-insensitive symbol lookup; first match wins
    pub fn by_symbol(&self, symbol: &str) -> Option<&Token> {
        self.tokens
            .iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
    }

    /// Resolve "0x..." addresses or symbols
    pub fn lookup(&self, key: &str) -> Option<&Token> {
        match twinroute_core::parse_address(key) {
            Ok(address) => self.by_address(address),
            Err(_) => self.by_symbol(key),
        }
    }

    /// Add a user-supplied token; duplicates by address are rejected
    pub fn import(&mut self, token: Token) -> Result<&Token, AmmError> {
        if self.by_address(token.address).is_some() {
            return Err(AmmError::InvalidToken(format!(
                "{} is already listed",
                lowercase_hex(&token.address)
            )));
        }
        self.tokens.push(token.imported());
        self.tokens
            .last()
            .ok_or_else(|| AmmError::InvalidToken("import failed".to_string()))
    }

    /// Read metadata from the contract and import it
    pub async fn import_from_chain(
        &mut self,
        client: &EvmClient,
        address: Address,
    ) -> Result<&Token, AmmError> {
        let meta = queries::token_metadata(client, address).await?;
        let token =
            Token::from_parts(meta.symbol, meta.name, address, meta.decimals).map_err(protocol_err)?;
        tracing::info!(
            token = %lowercase_hex(&address),
            symbol = %token.symbol,
            "Imported token"
        );
        self.import(token)
    }
}

fn protocol_err(e: ProtocolError) -> AmmError {
    AmmError::InvalidToken(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::SolCall;
    use evm_client::abi::IERC20;
    use evm_client::testing::MockProvider;

    #[test]
    fn test_defaults_include_native_and_wrapped() {
        let chain = ChainConfig::default();
        let registry = TokenRegistry::with_defaults(&chain).unwrap();
        let native = registry.by_symbol("eth").unwrap();
        assert!(chain.is_native(native.address));
        assert_eq!(registry.by_symbol("weth").unwrap().address, chain.wrapped_native);
        assert_eq!(registry.lookup("USDC").unwrap().decimals, 6);
        assert!(registry
            .lookup("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48")
            .is_some());
    }

    #[test]
    fn test_import_rejects_duplicates() {
        let chain = ChainConfig::default();
        let mut registry = TokenRegistry::with_defaults(&chain).unwrap();
        let pepe = Token::new("PEPE", "Pepe", "0x6982508145454ce325ddbe47a25d4ec3d2311933", 18).unwrap();
        assert!(registry.import(pepe.clone()).unwrap().imported);
        assert!(registry.import(pepe).is_err());
    }

    #[tokio::test]
    async fn test_import_from_chain() {
        let mock = MockProvider::new();
        let token = Address::repeat_byte(0x99);
        mock.set_call(
            token,
            IERC20::symbolCall {}.abi_encode(),
            IERC20::symbolCall::abi_encode_returns(&("ZZZ".to_string(),)),
        );
        mock.set_call(
            token,
            IERC20::nameCall {}.abi_encode(),
            IERC20::nameCall::abi_encode_returns(&("Zed".to_string(),)),
        );
        mock.set_call(
            token,
            IERC20::decimalsCall {}.abi_encode(),
            IERC20::decimalsCall::abi_encode_returns(&(9u8,)),
        );

        let mut registry = TokenRegistry::with_defaults(&ChainConfig::default()).unwrap();
        let imported = registry.import_from_chain(&mock.client(), token).await.unwrap();
        assert_eq!(imported.symbol, "ZZZ");
        assert_eq!(imported.decimals, 9);
        assert!(imported.imported);
    }
}
