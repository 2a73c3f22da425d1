// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! Protocol versioning. Each hard fork widens the contract surface at a
//! fixed activation height; the version resolved for a block decides which
//! operations exist and how claim tickets are hashed.

use kes_parameters::{forks, prices};
use kes_types::U256;
use tlv_abi::TlvTag;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProtocolVersion {
    /// Launch rules: token family only.
    Genesis,
    /// Adds liquidity pools and the distribution command.
    Dex,
    /// Adds the cross-chain bridge with transfer-id claim tickets.
    Bridge,
    /// Current rules: bridge tickets carry an explicit ticket hash and the
    /// token name joins the hashed fields.
    BridgeV2,
}

impl ProtocolVersion {
    /// Whether `tag` names an operation this version understands.
    pub fn supports(&self, tag: TlvTag) -> bool {
        use TlvTag::*;
        let since = match tag {
            CreateToken | Transfer | Mint | Burn => ProtocolVersion::Genesis,
            PoolCreate | PoolAddLiquidity | PoolRemoveLiquidity | PoolSellExact
            | PoolBuyExact | DexCmdDistribute => ProtocolVersion::Dex,
            TokenSendOverBridge | ClaimInit | ClaimConfirm | Claim | SetOwner
            | SetThreshold | AddValidator | RemoveValidator | AddNetwork
            | RemoveNetwork => ProtocolVersion::Bridge,
            _ => return false,
        };
        *self >= since
    }

    /// Claim tickets minted before the v2 fork stay verifiable under the
    /// rules they were created with.
    pub fn ticket_includes_token_name(&self) -> bool {
        *self >= ProtocolVersion::BridgeV2
    }
}

/// Ascending `(activation_height, version)` pairs. Resolution picks the
/// greatest activation at or below the queried height.
#[derive(Clone, Debug)]
pub struct ForkTable {
    transitions: Vec<(u64, ProtocolVersion)>,
}

impl ForkTable {
    pub fn new(mut transitions: Vec<(u64, ProtocolVersion)>) -> Self {
        transitions.sort();
        ForkTable { transitions }
    }

    pub fn version_at(&self, height: u64) -> ProtocolVersion {
        self.transitions
            .iter()
            .rev()
            .find(|(activation, _)| *activation <= height)
            .map(|(_, version)| *version)
            .unwrap_or(ProtocolVersion::Genesis)
    }
}

impl Default for ForkTable {
    fn default() -> Self {
        ForkTable::new(vec![
            (0, ProtocolVersion::Genesis),
            (forks::DEX_HEIGHT, ProtocolVersion::Dex),
            (forks::BRIDGE_HEIGHT, ProtocolVersion::Bridge),
            (forks::BRIDGE_V2_HEIGHT, ProtocolVersion::BridgeV2),
        ])
    }
}

/// Flat fees in the smallest native unit, charged up front per operation.
#[derive(Clone, Debug)]
pub struct Pricelist {
    pub create_token: U256,
    pub token_op: U256,
    pub pool_create: U256,
    pub pool_op: U256,
    pub bridge_op: U256,
    pub bridge_admin_op: U256,
}

impl Default for Pricelist {
    fn default() -> Self {
        Pricelist {
            create_token: U256::from(prices::CREATE_TOKEN),
            token_op: U256::from(prices::TOKEN_OP),
            pool_create: U256::from(prices::POOL_CREATE),
            pool_op: U256::from(prices::POOL_OP),
            bridge_op: U256::from(prices::BRIDGE_OP),
            bridge_admin_op: U256::from(prices::BRIDGE_ADMIN_OP),
        }
    }
}

impl Pricelist {
    pub fn price_of(&self, tag: TlvTag) -> Option<U256> {
        use TlvTag::*;
        let price = match tag {
            CreateToken => self.create_token,
            Transfer | Mint | Burn | DexCmdDistribute => self.token_op,
            PoolCreate => self.pool_create,
            PoolAddLiquidity | PoolRemoveLiquidity | PoolSellExact | PoolBuyExact => {
                self.pool_op
            }
            TokenSendOverBridge | ClaimInit | ClaimConfirm | Claim => self.bridge_op,
            SetOwner | SetThreshold | AddValidator | RemoveValidator | AddNetwork
            | RemoveNetwork => self.bridge_admin_op,
            _ => return None,
        };
        Some(price)
    }
}

/// Pricelist revisions keyed by the version they take effect at. Resolution
/// mirrors the fork table: the greatest revision at or below the queried
/// version wins, falling back to the launch list.
#[derive(Clone, Debug)]
pub struct PriceTable {
    base: Pricelist,
    revisions: Vec<(ProtocolVersion, Pricelist)>,
}

impl PriceTable {
    pub fn new(base: Pricelist, mut revisions: Vec<(ProtocolVersion, Pricelist)>) -> Self {
        revisions.sort_by_key(|(since, _)| *since);
        PriceTable { base, revisions }
    }

    pub fn pricelist_at(&self, version: ProtocolVersion) -> &Pricelist {
        self.revisions
            .iter()
            .rev()
            .find(|(since, _)| *since <= version)
            .map(|(_, list)| list)
            .unwrap_or(&self.base)
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        PriceTable::new(Pricelist::default(), Vec::new())
    }
}

/// Chain-wide parameters shared by every block.
#[derive(Clone, Debug, Default)]
pub struct CommonParams {
    pub forks: ForkTable,
    pub prices: PriceTable,
}

/// Per-block view of the parameters, resolved once per executed block.
#[derive(Clone, Debug)]
pub struct Spec {
    pub version: ProtocolVersion,
    pub block_height: u64,
    pub prices: Pricelist,
}

impl Spec {
    pub fn new(params: &CommonParams, block_height: u64) -> Self {
        let version = params.forks.version_at(block_height);
        Spec {
            version,
            block_height,
            prices: params.prices.pricelist_at(version).clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kes_parameters::{forks, prices};

    #[test]
    fn version_resolution_picks_greatest_activation_not_above_height() {
        let table = ForkTable::default();
        assert_eq!(table.version_at(0), ProtocolVersion::Genesis);
        assert_eq!(table.version_at(forks::DEX_HEIGHT - 1), ProtocolVersion::Genesis);
        assert_eq!(table.version_at(forks::DEX_HEIGHT), ProtocolVersion::Dex);
        assert_eq!(table.version_at(forks::BRIDGE_HEIGHT), ProtocolVersion::Bridge);
        assert_eq!(
            table.version_at(forks::BRIDGE_V2_HEIGHT - 1),
            ProtocolVersion::Bridge
        );
        assert_eq!(table.version_at(u64::MAX), ProtocolVersion::BridgeV2);
    }

    #[test]
    fn unsorted_transition_lists_are_normalized() {
        let table = ForkTable::new(vec![
            (500, ProtocolVersion::Bridge),
            (0, ProtocolVersion::Genesis),
            (100, ProtocolVersion::Dex),
        ]);
        assert_eq!(table.version_at(100), ProtocolVersion::Dex);
        assert_eq!(table.version_at(499), ProtocolVersion::Dex);
        assert_eq!(table.version_at(500), ProtocolVersion::Bridge);
    }

    #[test]
    fn operation_availability_widens_per_fork() {
        assert!(ProtocolVersion::Genesis.supports(TlvTag::Transfer));
        assert!(!ProtocolVersion::Genesis.supports(TlvTag::PoolSellExact));
        assert!(ProtocolVersion::Dex.supports(TlvTag::PoolSellExact));
        assert!(!ProtocolVersion::Dex.supports(TlvTag::Claim));
        assert!(ProtocolVersion::Bridge.supports(TlvTag::Claim));
        assert!(ProtocolVersion::BridgeV2.supports(TlvTag::AddValidator));
        // Field kinds are never operations.
        assert!(!ProtocolVersion::BridgeV2.supports(TlvTag::Parameters));
    }

    #[test]
    fn pricelist_revisions_take_effect_at_their_version() {
        let mut revised = Pricelist::default();
        revised.pool_op = U256::from(42u64);
        let params = CommonParams {
            forks: ForkTable::default(),
            prices: PriceTable::new(
                Pricelist::default(),
                vec![(ProtocolVersion::Dex, revised)],
            ),
        };
        let before = Spec::new(&params, forks::DEX_HEIGHT - 1);
        assert_eq!(before.prices.pool_op, U256::from(prices::POOL_OP));
        let at = Spec::new(&params, forks::DEX_HEIGHT);
        assert_eq!(at.prices.pool_op, U256::from(42u64));
        // Later versions inherit the revision until another one supersedes it.
        let later = Spec::new(&params, forks::BRIDGE_V2_HEIGHT);
        assert_eq!(later.prices.pool_op, U256::from(42u64));
    }

    #[test]
    fn ticket_schema_switches_at_v2() {
        assert!(!ProtocolVersion::Bridge.ticket_includes_token_name());
        assert!(ProtocolVersion::BridgeV2.ticket_includes_token_name());
    }
}
