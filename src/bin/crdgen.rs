//! # CRD Generator
//!
//! Prints the `User`, `Kubeconfig` and `UserSyncGithub` CustomResourceDefinitions
//! as one multi-document YAML stream.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/klum.yaml
//!
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use klum_controller::crd::{Kubeconfig, User, UserSyncGithub};
use kube::core::CustomResourceExt;

fn render(crds: &[CustomResourceDefinition]) -> Result<String, serde_yaml::Error> {
    let mut out = String::new();
    for crd in crds {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(crd)?);
    }
    Ok(out)
}

fn main() {
    match render(&[User::crd(), Kubeconfig::crd(), UserSyncGithub::crd()]) {
        Ok(yaml) => {
            print!("{yaml}");
        }
        Err(e) => {
            eprintln!("Failed to serialize CRD to YAML: {e}");
            std::process::exit(1);
        }
    }
}
