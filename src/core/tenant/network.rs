use super::{
    TenantStackBuilder, AZ_COUNT, DATABASE_SG, ENDPOINT_SG, LOAD_BALANCER_SG, SERVICE_SG, VPC,
};
use crate::domain::model::intrinsic::{azs, get_att, reference, select, sub};
use crate::domain::model::Resource;
use crate::domain::ports::GraphSink;
use crate::utils::error::Result;
use serde_json::{json, Value};

pub const VPC_CIDR: &str = "10.0.0.0/16";
pub const INTERNET_GATEWAY: &str = "InternetGateway";
pub const GATEWAY_ATTACHMENT: &str = "InternetGatewayAttachment";
pub const PUBLIC_ROUTE_TABLE: &str = "PublicRouteTable";
pub const PUBLIC_DEFAULT_ROUTE: &str = "PublicDefaultRoute";
pub const DATABASE_PORT: u16 = 5432;

/// Interface endpoints the workload reaches without leaving the VPC: (logical id, service).
pub const INTERFACE_ENDPOINTS: [(&str, &str); 9] = [
    ("BedrockRuntimeEndpoint", "bedrock-runtime"),
    ("EventBridgeEndpoint", "events"),
    ("CloudWatchLogsEndpoint", "logs"),
    ("CognitoIdpEndpoint", "cognito-idp"),
    ("KmsEndpoint", "kms"),
    ("EcrApiEndpoint", "ecr.api"),
    ("EcrDockerEndpoint", "ecr.dkr"),
    ("SecretsManagerEndpoint", "secretsmanager"),
    ("SqsEndpoint", "sqs"),
];

pub const GATEWAY_ENDPOINT: &str = "S3GatewayEndpoint";

/// Image layers are served from S3, so the docker endpoint is only usable once the gateway exists.
const ECR_DOCKER_ENDPOINT: &str = "EcrDockerEndpoint";

pub fn public_subnet(az: usize) -> String {
    format!("PublicSubnet{}", az + 1)
}

pub fn private_subnet(az: usize) -> String {
    format!("PrivateSubnet{}", az + 1)
}

fn private_route_table(az: usize) -> String {
    format!("PrivateRouteTable{}", az + 1)
}

pub fn private_subnet_ids() -> Vec<Value> {
    (0..AZ_COUNT).map(|az| reference(&private_subnet(az))).collect()
}

pub fn public_subnet_ids() -> Vec<Value> {
    (0..AZ_COUNT).map(|az| reference(&public_subnet(az))).collect()
}

/// /20 blocks: public subnets first, then private.
fn subnet_cidr(index: usize) -> String {
    format!("10.0.{}.0/20", index * 16)
}

fn tags(name: String) -> Value {
    json!([{ "Key": "Name", "Value": name }])
}

/// A security group with the implicit allow-all egress replaced by a rule that matches nothing.
pub fn security_group(sink: &mut dyn GraphSink, logical_id: &str, description: &str) -> Result<()> {
    sink.add_resource(
        logical_id,
        Resource::new(
            "AWS::EC2::SecurityGroup",
            json!({
                "GroupDescription": description,
                "VpcId": reference(VPC),
                "SecurityGroupEgress": [{
                    "CidrIp": "255.255.255.255/32",
                    "Description": "Disallow all traffic",
                    "IpProtocol": "icmp",
                    "FromPort": 252,
                    "ToPort": 86,
                }],
            }),
        ),
    )
}

pub(super) fn declare(builder: &TenantStackBuilder<'_>, sink: &mut dyn GraphSink) -> Result<()> {
    let names = builder.config.names();

    sink.add_resource(
        VPC,
        Resource::new(
            "AWS::EC2::VPC",
            json!({
                "CidrBlock": VPC_CIDR,
                "EnableDnsSupport": true,
                "EnableDnsHostnames": true,
                "Tags": tags(names.name("vpc")),
            }),
        ),
    )?;
    sink.add_resource(
        INTERNET_GATEWAY,
        Resource::new("AWS::EC2::InternetGateway", json!({ "Tags": tags(names.name("igw")) })),
    )?;
    sink.add_resource(
        GATEWAY_ATTACHMENT,
        Resource::new(
            "AWS::EC2::VPCGatewayAttachment",
            json!({ "VpcId": reference(VPC), "InternetGatewayId": reference(INTERNET_GATEWAY) }),
        ),
    )?;

    sink.add_resource(
        PUBLIC_ROUTE_TABLE,
        Resource::new("AWS::EC2::RouteTable", json!({ "VpcId": reference(VPC) })),
    )?;
    sink.add_resource(
        PUBLIC_DEFAULT_ROUTE,
        Resource::new(
            "AWS::EC2::Route",
            json!({
                "RouteTableId": reference(PUBLIC_ROUTE_TABLE),
                "DestinationCidrBlock": "0.0.0.0/0",
                "GatewayId": reference(INTERNET_GATEWAY),
            }),
        )
        .depends_on(GATEWAY_ATTACHMENT),
    )?;

    for az in 0..AZ_COUNT {
        sink.add_resource(
            &public_subnet(az),
            Resource::new(
                "AWS::EC2::Subnet",
                json!({
                    "VpcId": reference(VPC),
                    "CidrBlock": subnet_cidr(az),
                    "AvailabilityZone": select(az, azs()),
                    "MapPublicIpOnLaunch": true,
                    "Tags": tags(names.name(&format!("public-{}", az + 1))),
                }),
            ),
        )?;
        sink.add_resource(
            &format!("{}RouteTableAssociation", public_subnet(az)),
            Resource::new(
                "AWS::EC2::SubnetRouteTableAssociation",
                json!({
                    "SubnetId": reference(&public_subnet(az)),
                    "RouteTableId": reference(PUBLIC_ROUTE_TABLE),
                }),
            ),
        )?;
    }

    let nat_gateways = builder.config.nat_gateways() as usize;
    for nat in 0..nat_gateways {
        let eip = format!("NatEip{}", nat + 1);
        sink.add_resource(
            &eip,
            Resource::new("AWS::EC2::EIP", json!({ "Domain": "vpc" })).depends_on(GATEWAY_ATTACHMENT),
        )?;
        sink.add_resource(
            &format!("NatGateway{}", nat + 1),
            Resource::new(
                "AWS::EC2::NatGateway",
                json!({
                    "AllocationId": get_att(&eip, "AllocationId"),
                    "SubnetId": reference(&public_subnet(nat)),
                    "Tags": tags(names.name(&format!("nat-{}", nat + 1))),
                }),
            )
            .depends_on(PUBLIC_DEFAULT_ROUTE),
        )?;
    }

    for az in 0..AZ_COUNT {
        sink.add_resource(
            &private_subnet(az),
            Resource::new(
                "AWS::EC2::Subnet",
                json!({
                    "VpcId": reference(VPC),
                    "CidrBlock": subnet_cidr(AZ_COUNT + az),
                    "AvailabilityZone": select(az, azs()),
                    "MapPublicIpOnLaunch": false,
                    "Tags": tags(names.name(&format!("private-{}", az + 1))),
                }),
            ),
        )?;
        sink.add_resource(
            &private_route_table(az),
            Resource::new("AWS::EC2::RouteTable", json!({ "VpcId": reference(VPC) })),
        )?;
        sink.add_resource(
            &format!("{}RouteTableAssociation", private_subnet(az)),
            Resource::new(
                "AWS::EC2::SubnetRouteTableAssociation",
                json!({
                    "SubnetId": reference(&private_subnet(az)),
                    "RouteTableId": reference(&private_route_table(az)),
                }),
            ),
        )?;
        if nat_gateways > 0 {
            let nat = az.min(nat_gateways - 1);
            sink.add_resource(
                &format!("{}DefaultRoute", private_route_table(az)),
                Resource::new(
                    "AWS::EC2::Route",
                    json!({
                        "RouteTableId": reference(&private_route_table(az)),
                        "DestinationCidrBlock": "0.0.0.0/0",
                        "NatGatewayId": reference(&format!("NatGateway{}", nat + 1)),
                    }),
                ),
            )?;
        }
    }

    security_group(sink, ENDPOINT_SG, "Interface endpoints reachable from the API service")?;

    sink.add_resource(
        GATEWAY_ENDPOINT,
        Resource::new(
            "AWS::EC2::VPCEndpoint",
            json!({
                "VpcId": reference(VPC),
                "ServiceName": sub("com.amazonaws.${AWS::Region}.s3"),
                "VpcEndpointType": "Gateway",
                "RouteTableIds": (0..AZ_COUNT)
                    .map(|az| reference(&private_route_table(az)))
                    .collect::<Vec<_>>(),
            }),
        ),
    )?;

    for (logical_id, service) in INTERFACE_ENDPOINTS {
        let mut endpoint = Resource::new(
            "AWS::EC2::VPCEndpoint",
            json!({
                "VpcId": reference(VPC),
                "ServiceName": sub(&format!("com.amazonaws.${{AWS::Region}}.{}", service)),
                "VpcEndpointType": "Interface",
                "PrivateDnsEnabled": true,
                "SubnetIds": private_subnet_ids(),
                "SecurityGroupIds": [get_att(ENDPOINT_SG, "GroupId")],
            }),
        );
        if logical_id == ECR_DOCKER_ENDPOINT {
            endpoint = endpoint.depends_on(GATEWAY_ENDPOINT);
        }
        sink.add_resource(logical_id, endpoint)?;
    }

    Ok(())
}

fn egress(from_sg: &str, protocol: &str, port: u16, destination: (&str, Value), description: &str) -> Resource {
    let mut properties = json!({
        "GroupId": get_att(from_sg, "GroupId"),
        "IpProtocol": protocol,
        "FromPort": port,
        "ToPort": port,
        "Description": description,
    });
    properties[destination.0] = destination.1;
    Resource::new("AWS::EC2::SecurityGroupEgress", properties)
}

fn ingress(to_sg: &str, from_sg: &str, port: u16, description: &str) -> Resource {
    Resource::new(
        "AWS::EC2::SecurityGroupIngress",
        json!({
            "GroupId": get_att(to_sg, "GroupId"),
            "SourceSecurityGroupId": get_att(from_sg, "GroupId"),
            "IpProtocol": "tcp",
            "FromPort": port,
            "ToPort": port,
            "Description": description,
        }),
    )
}

/// Every path the workload needs, allow-listed one rule at a time.
pub(super) fn declare_reachability(
    builder: &TenantStackBuilder<'_>,
    sink: &mut dyn GraphSink,
) -> Result<()> {
    let port = builder.config.services.api.container_port();

    sink.add_resource(
        "LoadBalancerToServiceEgress",
        egress(
            LOAD_BALANCER_SG,
            "tcp",
            port,
            ("DestinationSecurityGroupId", get_att(SERVICE_SG, "GroupId")),
            "Load balancer to API containers",
        ),
    )?;
    sink.add_resource(
        "ServiceFromLoadBalancerIngress",
        ingress(SERVICE_SG, LOAD_BALANCER_SG, port, "Load balancer to API containers"),
    )?;

    sink.add_resource(
        "ServiceToEndpointsEgress",
        egress(
            SERVICE_SG,
            "tcp",
            443,
            ("DestinationSecurityGroupId", get_att(ENDPOINT_SG, "GroupId")),
            "API containers to interface endpoints",
        ),
    )?;
    sink.add_resource(
        "EndpointsFromServiceIngress",
        ingress(ENDPOINT_SG, SERVICE_SG, 443, "API containers to interface endpoints"),
    )?;

    sink.add_resource(
        "ServiceDnsEgress",
        egress(
            SERVICE_SG,
            "udp",
            53,
            ("CidrIp", get_att(VPC, "CidrBlock")),
            "DNS resolution inside the VPC",
        ),
    )?;

    sink.add_resource(
        "ServiceToS3Egress",
        egress(
            SERVICE_SG,
            "tcp",
            443,
            (
                "DestinationPrefixListId",
                json!(builder.lookups.s3_prefix_list_id),
            ),
            "API containers to S3 through the gateway endpoint",
        ),
    )?;

    sink.add_resource(
        "ServiceToDatabaseEgress",
        egress(
            SERVICE_SG,
            "tcp",
            DATABASE_PORT,
            ("DestinationSecurityGroupId", get_att(DATABASE_SG, "GroupId")),
            "API containers to the database",
        ),
    )?;
    sink.add_resource(
        "DatabaseFromServiceIngress",
        ingress(DATABASE_SG, SERVICE_SG, DATABASE_PORT, "API containers to the database"),
    )?;

    Ok(())
}
