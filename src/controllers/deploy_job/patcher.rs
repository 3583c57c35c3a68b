use tracing::info;

use super::resolver::WorkloadTarget;
use super::DeployError;
use crate::cluster::ClusterClient;
use crate::models::ReplaceResource;

/// Points every target container at `image`, recording each successful
/// update in `ledger`. Stops at the first failure; updates already applied
/// stay in place.
pub(super) async fn patch_images(
    client: &dyn ClusterClient,
    namespace: &str,
    targets: &[WorkloadTarget],
    image: &str,
    ledger: &mut Vec<ReplaceResource>,
) -> Result<(), DeployError> {
    for target in targets {
        client
            .update_container_image(target.kind, namespace, &target.name, &target.container, image)
            .await
            .map_err(|source| DeployError::Patch {
                resource: target.kind.resource(),
                namespace: namespace.to_string(),
                name: target.name.clone(),
                container: target.container.clone(),
                source,
            })?;

        info!(
            "Replaced image of {}/{}/{}/{}: {} -> {}",
            namespace,
            target.kind.resource(),
            target.name,
            target.container,
            target.current_image,
            image
        );
        ledger.push(ReplaceResource {
            kind: target.kind,
            name: target.name.clone(),
            container: target.container.clone(),
            origin: target.current_image.clone(),
        });
    }
    Ok(())
}
