use voxelcraft_engine::rules::Material;
use voxelcraft_engine::world::block::BlockId;
use voxelcraft_server::blocks;

#[test]
fn catalog_ids_match_beta_numbering() {
    let registry = blocks::registry();
    let expected = [
        ("stone", 1),
        ("grass", 2),
        ("dirt", 3),
        ("cobblestone", 4),
        ("bedrock", 7),
        ("water", 8),
        ("stationary_water", 9),
        ("lava", 10),
        ("stationary_lava", 11),
        ("sand", 12),
        ("gravel", 13),
        ("log", 17),
        ("leaves", 18),
        ("glass", 20),
        ("obsidian", 49),
        ("torch", 50),
        ("fire", 51),
        ("crops", 59),
        ("farmland", 60),
        ("snow_layer", 78),
        ("ice", 79),
        ("snow_block", 80),
    ];
    for (name, id) in expected {
        assert_eq!(registry.by_name(name), Some(BlockId(id)), "{} has the wrong id", name);
    }
    assert_eq!(registry.registered_count(), expected.len() + 1);
}

#[test]
fn light_properties() {
    let registry = blocks::registry();
    assert_eq!(registry.get(blocks::TORCH).emission, 14);
    assert_eq!(registry.get(blocks::LAVA).emission, 15);
    assert_eq!(registry.get(blocks::FIRE).emission, 15);
    assert_eq!(registry.get(blocks::WATER).opacity, 3);
    assert_eq!(registry.get(blocks::ICE).opacity, 3);
    assert_eq!(registry.get(blocks::LEAVES).opacity, 1);
    assert_eq!(registry.get(blocks::GLASS).opacity, 0);
    assert_eq!(registry.get(blocks::STONE).opacity, 15);
    assert_eq!(registry.get(blocks::WATER).material, Material::Water);
}

#[test]
fn weather_blocks_are_wired() {
    let weather = blocks::registry().weather.expect("weather blocks registered");
    assert_eq!(weather.snow_layer, blocks::SNOW_LAYER);
    assert_eq!(weather.ice, blocks::ICE);
    assert_eq!(weather.freezing_water, blocks::STATIONARY_WATER);
    assert_eq!(weather.fire, blocks::FIRE);
}
