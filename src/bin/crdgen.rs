//! # CRD Generator
//!
//! Prints the `ClusterUser` CustomResourceDefinition as YAML.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/clusteruser.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use kube::core::CustomResourceExt;
use user_pki_controller::crd::ClusterUser;

fn main() {
    let crd = ClusterUser::crd();

    match serde_yaml::to_string(&crd) {
        Ok(yaml) => {
            print!("{yaml}");
        }
        Err(e) => {
            eprintln!("Failed to serialize CRD to YAML: {e}");
            std::process::exit(1);
        }
    }
}
