use std::path::PathBuf;
use std::sync::Arc;

use dicom_mpr::{
    CrosshairStyle, Interpolation, MprSession, Orientation, SoftwareRenderer, SortBy,
    VolumeLoader, render::Viewport,
};
use nalgebra::Vector2;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("dicom_mpr=info".parse().unwrap()))
        .init();

    let dir = std::env::args().nth(1).map_or_else(|| PathBuf::from("dicom"), PathBuf::from);
    let paths = VolumeLoader::dicom_paths(&dir).expect("should have found .dcm files");
    let volume = VolumeLoader::load_from_file_paths_async(&paths, SortBy::ImagePositionPatient)
        .await
        .expect("should have loaded files from directory");
    let volume = Arc::new(volume);

    let mut session = MprSession::new(
        volume.clone(),
        [Viewport::new(512, 512); 3],
        CrosshairStyle::default(),
    );

    // a short oblique drag on the axial crosshair, past the dashed zone
    let center = Vector2::new(256.0, 256.0);
    let grab = (center + Vector2::new(200.0, 0.0)).into();
    session.pointer_down(Orientation::Axial, grab);
    session.pointer_move(Orientation::Axial, (center + Vector2::new(190.0, 60.0)).into());
    session.pointer_up();

    let mut renderer = SoftwareRenderer::new(volume, Interpolation::Trilinear);
    session.render_frame(&mut renderer);
    for view in Orientation::ALL {
        let name = format!("{}.png", view.to_string().to_lowercase());
        renderer
            .composite(view)
            .expect("should have rendered every view")
            .save(&name)
            .expect("should have written the image");
        info!(%view, file = %name, "saved view");
    }
}
