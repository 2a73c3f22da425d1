// Copyright 2023 Kestrel Foundation. All rights reserved.
// Kestrel is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

/// The shared tag space of operations and field kinds. Code points are wire
/// format and must never be renumbered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum TlvTag {
    Root = 0x0000,
    CreateToken = 0x0200,
    Signature = 0x0500,
    Hash = 0x0600,
    String = 0x0700,
    Int = 0x0800,
    BigInt = 0x0900,
    Float = 0x0a00,
    Object = 0x0c00,
    Key = 0x0d00,
    Parameters = 0x0f00,
    Transfer = 0x1200,
    Mint = 0x1300,
    Burn = 0x1400,
    PoolCreate = 0x1500,
    PoolAddLiquidity = 0x1600,
    PoolRemoveLiquidity = 0x1700,
    PoolSellExact = 0x1800,
    DexCmdDistribute = 0x1f00,
    PoolBuyExact = 0x2100,
    TokenSendOverBridge = 0x2300,
    ClaimInit = 0x2400,
    ClaimConfirm = 0x2500,
    Claim = 0x2600,
    SetOwner = 0x2700,
    SetThreshold = 0x2800,
    AddValidator = 0x2900,
    RemoveValidator = 0x2a00,
    AddNetwork = 0x2b00,
    RemoveNetwork = 0x2c00,
}

impl TlvTag {
    pub fn from_u16(raw: u16) -> Option<TlvTag> {
        use TlvTag::*;
        Some(match raw {
            0x0000 => Root,
            0x0200 => CreateToken,
            0x0500 => Signature,
            0x0600 => Hash,
            0x0700 => String,
            0x0800 => Int,
            0x0900 => BigInt,
            0x0a00 => Float,
            0x0c00 => Object,
            0x0d00 => Key,
            0x0f00 => Parameters,
            0x1200 => Transfer,
            0x1300 => Mint,
            0x1400 => Burn,
            0x1500 => PoolCreate,
            0x1600 => PoolAddLiquidity,
            0x1700 => PoolRemoveLiquidity,
            0x1800 => PoolSellExact,
            0x1f00 => DexCmdDistribute,
            0x2100 => PoolBuyExact,
            0x2300 => TokenSendOverBridge,
            0x2400 => ClaimInit,
            0x2500 => ClaimConfirm,
            0x2600 => Claim,
            0x2700 => SetOwner,
            0x2800 => SetThreshold,
            0x2900 => AddValidator,
            0x2a00 => RemoveValidator,
            0x2b00 => AddNetwork,
            0x2c00 => RemoveNetwork,
            _ => return None,
        })
    }

    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Whether this tag names a contract operation, as opposed to a field
    /// kind. Whether the operation is actually priced at a given height is
    /// the fork dispatcher's business, not the codec's.
    pub fn is_operation(self) -> bool {
        use TlvTag::*;
        !matches!(
            self,
            Root | Signature | Hash | String | Int | BigInt | Float | Object | Key | Parameters
        )
    }
}
