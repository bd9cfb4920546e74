//! Well-known names and default templates shared by the synthesizers.

/// Schema version written into asset manifests and the assembly manifest.
pub const MANIFEST_SCHEMA_VERSION: &str = "5.0.0";

/// File name of the cloud assembly manifest inside the output directory.
pub const ASSEMBLY_MANIFEST_FILENAME: &str = "manifest.json";

/// Separator used when building absolute construct paths.
pub const PATH_SEP: &str = "/";

/// Qualifier used when neither the props nor the context provide one.
pub const DEFAULT_QUALIFIER: &str = "hnb659fds";

/// Context key that overrides the bootstrap qualifier for a stack.
pub const BOOTSTRAP_QUALIFIER_CONTEXT: &str = "@aws-cdk/core:bootstrapQualifier";

pub const DEFAULT_FILE_ASSETS_BUCKET_NAME: &str = "cdk-${Qualifier}-assets-${AWS::AccountId}-${AWS::Region}";

pub const DEFAULT_IMAGE_ASSETS_REPOSITORY_NAME: &str =
  "cdk-${Qualifier}-container-assets-${AWS::AccountId}-${AWS::Region}";

pub const DEFAULT_DEPLOY_ROLE_ARN: &str =
  "arn:${AWS::Partition}:iam::${AWS::AccountId}:role/cdk-${Qualifier}-deploy-role-${AWS::AccountId}-${AWS::Region}";

pub const DEFAULT_CLOUDFORMATION_ROLE_ARN: &str =
  "arn:${AWS::Partition}:iam::${AWS::AccountId}:role/cdk-${Qualifier}-cfn-exec-role-${AWS::AccountId}-${AWS::Region}";

pub const DEFAULT_FILE_ASSET_PUBLISHING_ROLE_ARN: &str = "arn:${AWS::Partition}:iam::${AWS::AccountId}:role/cdk-${Qualifier}-file-publishing-role-${AWS::AccountId}-${AWS::Region}";

pub const DEFAULT_IMAGE_ASSET_PUBLISHING_ROLE_ARN: &str = "arn:${AWS::Partition}:iam::${AWS::AccountId}:role/cdk-${Qualifier}-image-publishing-role-${AWS::AccountId}-${AWS::Region}";

/// Lowest bootstrap stack version that provides the resources the default
/// synthesizer refers to.
pub const MIN_BOOTSTRAP_STACK_VERSION: u32 = 1;

/// Environment key components used when account or region is not known at
/// synthesis time.
pub const CURRENT_ACCOUNT: &str = "current_account";
pub const CURRENT_REGION: &str = "current_region";

/// Environment string components for environment-agnostic stacks.
pub const UNKNOWN_ACCOUNT: &str = "unknown-account";
pub const UNKNOWN_REGION: &str = "unknown-region";

/// Separator between the prefix and the file name in legacy asset key parameters.
pub const ASSET_PREFIX_SEPARATOR: &str = "||";

/// Repository used by the legacy synthesizer for container images.
pub const ASSETS_ECR_REPOSITORY_NAME: &str = "aws-cdk/assets";

/// Context key that overrides [`ASSETS_ECR_REPOSITORY_NAME`].
pub const ASSETS_ECR_REPOSITORY_NAME_OVERRIDE_CONTEXT_KEY: &str = "assets-ecr-repository-name";

/// Metadata entry types.
pub const ASSET_METADATA: &str = "aws:cdk:asset";
pub const STACK_TAGS_METADATA: &str = "aws:cdk:stack-tags";

/// Length of the hex digest suffix appended to generated unique IDs.
pub const UNIQUE_ID_HASH_LEN: usize = 8;
