//! Contract bindings for the source core contract and the migration target.

use alloy::sol;

sol! {
    /// Events and views of the deployed core contract state is migrated from.
    #[sol(all_derives)]
    interface ICoreSource {
        event AddChannel(address indexed channel, uint8 indexed channelType, bytes identity);
        event UpdateChannel(address indexed channel, bytes identity);
        event AddDelegate(address channel, address delegate);
        event RemoveDelegate(address channel, address delegate);
        event Staked(address indexed user, uint256 indexed amountStaked);
        event Unstaked(address indexed user, uint256 indexed amountUnstaked);
        event RewardsHarvested(address indexed user, uint256 indexed rewardAmount, uint256 fromEpoch, uint256 tillEpoch);

        function channels(address channel) external view returns (
            uint8 channelType,
            uint8 channelState,
            address verifiedBy,
            uint256 poolContribution,
            uint256 channelHistoricalZ,
            uint256 channelFairShareCount,
            uint256 channelLastUpdate,
            uint256 channelStartBlock,
            uint256 channelUpdateBlock,
            uint256 channelWeight,
            uint256 expiryTime
        );
        function delegatedNotificationSenders(address channel, address delegate) external view returns (bool);
        function userFeesInfo(address user) external view returns (
            uint256 stakedAmount,
            uint256 stakedWeight,
            uint256 lastStakedBlock,
            uint256 lastClaimedBlock
        );
        function usersRewardsClaimed(address user) external view returns (uint256);
        function epochRewards(uint256 epoch) external view returns (uint256);
        function epochToTotalStakedWeight(uint256 epoch) external view returns (uint256);
    }

    /// Bulk import entry points of the destination contract.
    ///
    /// Each call carries the `[startIndex, endIndex)` range it covers and parallel arrays of
    /// `endIndex - startIndex` elements.
    #[sol(all_derives)]
    interface IMigrationTarget {
        function migrateChannelData(
            uint256 startIndex,
            uint256 endIndex,
            address[] channelAddresses,
            uint8[] channelTypes,
            bytes[] identities,
            uint256[] amounts,
            uint256[] channelExpiryTimes
        ) external;
        function migrateDelegateData(
            uint256 startIndex,
            uint256 endIndex,
            address[] channels,
            address[] delegates
        ) external;
        function migrateStakerData(
            uint256 startIndex,
            uint256 endIndex,
            address[] users,
            uint256[] stakedAmounts,
            uint256[] stakedWeights,
            uint256[] lastStakedBlocks,
            uint256[] lastClaimedBlocks,
            uint256[] rewardsClaimed
        ) external;
        function migrateUserEpochWeights(
            uint256 startIndex,
            uint256 endIndex,
            address[] users,
            uint256[][] epochWeights
        ) external;
        function migrateEpochData(
            uint256 startIndex,
            uint256 endIndex,
            uint256[] epochRewards,
            uint256[] epochToTotalStakedWeight
        ) external;
    }
}
