//! Contract interfaces the harness calls into.

use alloy_sol_types::{SolCall, sol};

sol! {
    /// An Ante test: a contract whose predicate reports whether the protocol invariant holds.
    interface IAnteTest {
        function checkTestPasses() external returns (bool);
    }

    /// The ERC20 subset used to confirm forged balances.
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
    }
}

/// Signature of the predicate every Ante test exposes.
pub const DEFAULT_PREDICATE: &str = IAnteTest::checkTestPassesCall::SIGNATURE;
