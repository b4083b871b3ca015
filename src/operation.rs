use crate::{RetryPolicy, RetrySafety};

/// Upstream gateway an operation is delivered to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    CoreBanking,
    /// Instant payment system.
    Ips,
    Wallet,
}

/// Banking calls routed through the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    FundTransfer,
    AccountLookup,
    AccountBalance,
    StandingOrderCreate,
    StandingOrderCancel,
    StandingOrderList,
    AmountLock,
    AmountUnlock,
    MiniStatement,
    IpsTransfer,
    IpsAccountInquiry,
    WalletTransfer,
    WalletAccountInquiry,
}

impl Operation {
    pub const ALL: [Operation; 13] = [
        Self::FundTransfer,
        Self::AccountLookup,
        Self::AccountBalance,
        Self::StandingOrderCreate,
        Self::StandingOrderCancel,
        Self::StandingOrderList,
        Self::AmountLock,
        Self::AmountUnlock,
        Self::MiniStatement,
        Self::IpsTransfer,
        Self::IpsAccountInquiry,
        Self::WalletTransfer,
        Self::WalletAccountInquiry,
    ];

    /// Stable identifier used in logs and `SOAPAction` lookups.
    pub fn name(self) -> &'static str {
        match self {
            Self::FundTransfer => "fund_transfer",
            Self::AccountLookup => "account_lookup",
            Self::AccountBalance => "account_balance",
            Self::StandingOrderCreate => "standing_order_create",
            Self::StandingOrderCancel => "standing_order_cancel",
            Self::StandingOrderList => "standing_order_list",
            Self::AmountLock => "amount_lock",
            Self::AmountUnlock => "amount_unlock",
            Self::MiniStatement => "mini_statement",
            Self::IpsTransfer => "ips_transfer",
            Self::IpsAccountInquiry => "ips_account_inquiry",
            Self::WalletTransfer => "wallet_transfer",
            Self::WalletAccountInquiry => "wallet_account_inquiry",
        }
    }

    pub fn channel(self) -> Channel {
        match self {
            Self::IpsTransfer | Self::IpsAccountInquiry => Channel::Ips,
            Self::WalletTransfer | Self::WalletAccountInquiry => Channel::Wallet,
            _ => Channel::CoreBanking,
        }
    }

    /// Calls that move money or change account state need an idempotency
    /// key before they are resent after an ambiguous failure.
    pub fn safety(self) -> RetrySafety {
        match self {
            Self::FundTransfer
            | Self::StandingOrderCreate
            | Self::StandingOrderCancel
            | Self::AmountLock
            | Self::AmountUnlock
            | Self::IpsTransfer
            | Self::WalletTransfer => RetrySafety::RequiresIdempotencyKey,
            Self::AccountLookup
            | Self::AccountBalance
            | Self::StandingOrderList
            | Self::MiniStatement
            | Self::IpsAccountInquiry
            | Self::WalletAccountInquiry => RetrySafety::SafeToRetry,
        }
    }

    pub fn default_policy(self) -> RetryPolicy {
        match self.safety() {
            RetrySafety::SafeToRetry => RetryPolicy::read_only(),
            RetrySafety::RequiresIdempotencyKey => RetryPolicy::money_movement(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Channel, Operation};
    use crate::RetrySafety;

    #[test]
    fn transfers_require_idempotency_key() {
        for op in [
            Operation::FundTransfer,
            Operation::IpsTransfer,
            Operation::WalletTransfer,
        ] {
            assert_eq!(op.safety(), RetrySafety::RequiresIdempotencyKey);
            assert_eq!(op.default_policy().safety(), RetrySafety::RequiresIdempotencyKey);
        }
    }

    #[test]
    fn lookups_are_safe_to_retry() {
        for op in [
            Operation::AccountLookup,
            Operation::MiniStatement,
            Operation::IpsAccountInquiry,
        ] {
            assert_eq!(op.safety(), RetrySafety::SafeToRetry);
        }
    }

    #[test]
    fn channels_follow_gateway() {
        assert_eq!(Operation::IpsTransfer.channel(), Channel::Ips);
        assert_eq!(Operation::WalletAccountInquiry.channel(), Channel::Wallet);
        assert_eq!(Operation::AmountLock.channel(), Channel::CoreBanking);
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = Operation::ALL.iter().map(|op| op.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Operation::ALL.len());
    }
}
