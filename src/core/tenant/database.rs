use super::network::{private_subnet_ids, security_group};
use super::{TenantStackBuilder, DATABASE, DATABASE_SG, TENANT_KEY};
use crate::domain::model::intrinsic::{get_att, reference};
use crate::domain::model::{RemovalPolicy, Resource};
use crate::domain::ports::GraphSink;
use crate::utils::error::Result;
use serde_json::json;

pub const DATABASE_ENGINE: &str = "aurora-postgresql";
pub const DATABASE_SUBNET_GROUP: &str = "DatabaseSubnetGroup";
pub const DATABASE_WRITER: &str = "DatabaseWriter";

pub fn reader(index: u32) -> String {
    format!("DatabaseReader{}", index + 1)
}

pub(super) fn declare(builder: &TenantStackBuilder<'_>, sink: &mut dyn GraphSink) -> Result<()> {
    let config = builder.config;
    let db = &config.database;

    // A retained cluster keeps a final snapshot instead of the live volume.
    let removal = match config.removal_policy() {
        RemovalPolicy::Retain => RemovalPolicy::Snapshot,
        other => other,
    };

    security_group(sink, DATABASE_SG, "Database reachable from the API service")?;

    sink.add_resource(
        DATABASE_SUBNET_GROUP,
        Resource::new(
            "AWS::RDS::DBSubnetGroup",
            json!({
                "DBSubnetGroupDescription": format!("Private subnets for {}", config.names().prefix()),
                "SubnetIds": private_subnet_ids(),
            }),
        ),
    )?;

    sink.add_resource(
        DATABASE,
        Resource::new(
            "AWS::RDS::DBCluster",
            json!({
                "Engine": DATABASE_ENGINE,
                "EngineVersion": db.engine_version(),
                "DatabaseName": db.name(),
                "MasterUsername": db.username(),
                "ManageMasterUserPassword": true,
                "MasterUserSecret": { "KmsKeyId": get_att(TENANT_KEY, "Arn") },
                "StorageEncrypted": true,
                "KmsKeyId": get_att(TENANT_KEY, "Arn"),
                "CopyTagsToSnapshot": true,
                "DeletionProtection": config.is_protected_environment(),
                "DBSubnetGroupName": reference(DATABASE_SUBNET_GROUP),
                "VpcSecurityGroupIds": [get_att(DATABASE_SG, "GroupId")],
            }),
        )
        .with_removal_policy(removal),
    )?;

    let instance = |promotion_tier: u32| {
        Resource::new(
            "AWS::RDS::DBInstance",
            json!({
                "DBClusterIdentifier": reference(DATABASE),
                "Engine": DATABASE_ENGINE,
                "DBInstanceClass": db.instance_class(),
                "DBSubnetGroupName": reference(DATABASE_SUBNET_GROUP),
                "PromotionTier": promotion_tier,
                "PubliclyAccessible": false,
            }),
        )
    };

    sink.add_resource(DATABASE_WRITER, instance(0))?;
    // Aurora makes the first instance created the writer.
    for index in 0..db.readers() {
        sink.add_resource(&reader(index), instance(1).depends_on(DATABASE_WRITER))?;
    }
    Ok(())
}
