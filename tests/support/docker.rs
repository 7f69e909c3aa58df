// ABOUTME: Throwaway containers on the local Docker daemon for end-to-end tests.
// ABOUTME: Pulls a small image, publishes exposed ports and force-removes on request.

use bollard::Docker;
use bollard::models::{ContainerCreateBody, HostConfig};
use bollard::query_parameters::{CreateImageOptions, RemoveContainerOptions};
use container_wait::target::BollardTarget;
use container_wait::types::ContainerId;
use futures::StreamExt;

pub const IMAGE: &str = "alpine:3.20";

pub struct TestContainer {
    client: Docker,
    pub id: ContainerId,
}

impl TestContainer {
    /// Run `script` with `/bin/sh -c`, publishing `exposed` ports on random host ports.
    pub async fn start(script: &str, exposed: &[&str]) -> Self {
        let client = Docker::connect_with_local_defaults().expect("docker should be reachable");

        let opts = CreateImageOptions {
            from_image: Some(IMAGE.to_string()),
            ..Default::default()
        };
        let mut pull = client.create_image(Some(opts), None, None);
        while let Some(progress) = pull.next().await {
            progress.expect("image pull should succeed");
        }

        let body = ContainerCreateBody {
            image: Some(IMAGE.to_string()),
            cmd: Some(vec!["/bin/sh".into(), "-c".into(), script.to_string()]),
            exposed_ports: if exposed.is_empty() {
                None
            } else {
                Some(exposed.iter().map(|p| p.to_string()).collect())
            },
            host_config: Some(HostConfig {
                publish_all_ports: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        let created = client
            .create_container(None::<bollard::query_parameters::CreateContainerOptions>, body)
            .await
            .expect("container create should succeed");
        client
            .start_container(
                &created.id,
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await
            .expect("container start should succeed");

        Self {
            client,
            id: ContainerId::new(created.id),
        }
    }

    pub fn target(&self) -> BollardTarget {
        BollardTarget::new(self.client.clone(), self.id.clone())
    }

    pub async fn remove(self) {
        let opts = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        let _ = self
            .client
            .remove_container(self.id.as_str(), Some(opts))
            .await;
    }
}
