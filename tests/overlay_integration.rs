use std::fs;
use std::path::Path;

use modpatch::archive::{ArchiveEntries, ArchiveFormat, ArchiveLocationCache, PackedArchiveFormat};
use modpatch::compress::Compression;
use modpatch::document::{Document, DocumentCodec, NativeCodec};
use modpatch::handler::{DocumentHandler, FileHandler};
use modpatch::io::{read_content, write_content};
use modpatch::overlay::{self, Assembler, Context, Merger, OverlayError, Packager, shop_param_key};
use modpatch::vanilla::{FingerprintIndex, Sha256Hasher};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn write(path: &Path, bytes: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

fn encode(doc: &Document) -> Vec<u8> {
    NativeCodec.encode(doc).unwrap()
}

fn decode(bytes: &[u8]) -> Document {
    NativeCodec.decode(bytes).unwrap()
}

fn pack(members: Vec<(&str, Vec<u8>)>) -> Vec<u8> {
    PackedArchiveFormat
        .encode(&members.into_iter().collect::<ArchiveEntries>())
        .unwrap()
}

fn unpack(path: &Path) -> ArchiveEntries {
    PackedArchiveFormat.decode(&fs::read(path).unwrap()).unwrap()
}

fn context(game: &Path) -> Context {
    Context::new(game)
        .with_compression(Compression::passthrough())
        .with_fingerprints(FingerprintIndex::new())
}

fn ints(values: &[i32]) -> Document {
    Document::Array(values.iter().copied().map(Document::Int32).collect())
}

// ---------------------------------------------------------------------------
// Packaging
// ---------------------------------------------------------------------------

#[test]
fn file_matching_any_revision_is_elided() {
    let v100: Document = [("speed", 1)].into_iter().collect();
    let v110: Document = [("speed", 2)].into_iter().collect();

    for versions in [[100, 110], [110, 100]] {
        let dir = tempdir().unwrap();
        let game = dir.path().join("game");
        let mod_root = dir.path().join("mod").join("romfs");
        let output = dir.path().join("out");
        write(&game.join("Banc/Map.byml"), &encode(&v100));
        write(&mod_root.join("Banc/Map.byml"), &encode(&v110));

        let mut index = FingerprintIndex::new();
        index.record(&Sha256Hasher, "Banc/Map.byml", Some(100), &encode(&v100));
        index.record(&Sha256Hasher, "Banc/Map.byml", Some(110), &encode(&v110));
        let ctx = context(&game)
            .with_fingerprints(index)
            .with_versions(&versions);

        let report = Packager::new(ctx, dir.path().join("mod"), &output).run().unwrap();
        assert_eq!(report.elided, 1, "versions {versions:?}");
        assert_eq!(report.written, 0);
        assert!(!output.join("romfs/Banc/Map.byml").exists());
    }
}

#[test]
fn modified_flat_file_becomes_a_patch() {
    let dir = tempdir().unwrap();
    let game = dir.path().join("game");
    let mod_root = dir.path().join("mod");
    let output = dir.path().join("out");
    let original: Document = [("speed", 1), ("size", 4)].into_iter().collect();
    let modified: Document = [("speed", 3), ("size", 4)].into_iter().collect();
    write(&game.join("Banc/Map.byml"), &encode(&original));
    write(&mod_root.join("Banc/Map.byml"), &encode(&modified));
    write(&mod_root.join("Banc/Extra.byml"), &encode(&ints(&[1])));

    let report = Packager::new(context(&game), &mod_root, &output).run().unwrap();
    assert_eq!(report.written, 1);
    assert_eq!(report.copied, 1);

    let patch = decode(&fs::read(output.join("romfs/Banc/Map.byml")).unwrap());
    assert_eq!(patch, modpatch::patch::diff(&original, &modified).to_document());
    assert_eq!(
        fs::read(output.join("romfs/Banc/Extra.byml")).unwrap(),
        encode(&ints(&[1]))
    );
}

#[test]
fn archive_round_trips_through_package_and_merge() {
    let dir = tempdir().unwrap();
    let game = dir.path().join("game");
    let mod_root = dir.path().join("mod").join("romfs");
    let packaged = dir.path().join("packaged");
    let merged = dir.path().join("merged");

    let param: Document = [("hp", 10), ("armor", 2)].into_iter().collect();
    let param_mod: Document = [("hp", 20), ("armor", 2)].into_iter().collect();
    let fresh: Document = [("x", 1)].into_iter().collect();
    write(
        &game.join("Pack/Actor/Npc.pack"),
        &pack(vec![
            ("Component/Param.bgyml", encode(&param)),
            ("Model/Mesh.bin", b"mesh".to_vec()),
        ]),
    );
    write(
        &mod_root.join("Pack/Actor/Npc.pack"),
        &pack(vec![
            ("Component/Param.bgyml", encode(&param_mod)),
            ("Model/Mesh.bin", b"mesh".to_vec()),
            ("Component/New.bgyml", encode(&fresh)),
        ]),
    );

    let mut index = FingerprintIndex::new();
    index.record(&Sha256Hasher, "Model/Mesh.bin", None, b"mesh");
    index.record(&Sha256Hasher, "Component/Param.bgyml", None, &encode(&param));
    let ctx = context(&game).with_fingerprints(index);

    let report = Packager::new(ctx.clone(), dir.path().join("mod"), &packaged)
        .run()
        .unwrap();
    assert_eq!(report.written, 1);

    let out = unpack(&packaged.join("romfs/Pack/Actor/Npc.pack"));
    assert!(!out.contains("Model/Mesh.bin"));
    assert_eq!(out.get("Component/New.bgyml").unwrap(), encode(&fresh).as_slice());
    assert_eq!(
        decode(out.get("Component/Param.bgyml").unwrap()),
        modpatch::patch::diff(&param, &param_mod).to_document()
    );

    Merger::new(ctx, [&packaged], &merged).run().unwrap();
    let result = unpack(&merged.join("Pack/Actor/Npc.pack"));
    assert_eq!(decode(result.get("Component/Param.bgyml").unwrap()), param_mod);
    assert_eq!(result.get("Model/Mesh.bin").unwrap(), b"mesh");
    assert_eq!(decode(result.get("Component/New.bgyml").unwrap()), fresh);
}

#[test]
fn vanilla_archive_is_elided_whole() {
    let dir = tempdir().unwrap();
    let game = dir.path().join("game");
    let mod_root = dir.path().join("mod");
    let archive = pack(vec![("Model/Mesh.bin", b"mesh".to_vec())]);
    write(&game.join("Pack/Thing.pack"), &archive);
    write(&mod_root.join("Pack/Thing.pack"), &archive);

    let mut index = FingerprintIndex::new();
    index.record(&Sha256Hasher, "Pack/Thing.pack", None, &archive);
    let ctx = context(&game).with_fingerprints(index);

    let output = dir.path().join("out");
    let report = Packager::new(ctx, &mod_root, &output).run().unwrap();
    assert_eq!(report.elided, 1);
    assert!(!output.join("romfs/Pack/Thing.pack").exists());
}

#[test]
fn undecodable_archive_is_copied_verbatim() {
    let dir = tempdir().unwrap();
    let game = dir.path().join("game");
    let mod_root = dir.path().join("mod");
    write(&mod_root.join("Pack/Broken.pack"), b"not an archive");

    let output = dir.path().join("out");
    let report = Packager::new(context(&game), &mod_root, &output).run().unwrap();
    assert_eq!(report.copied, 1);
    assert_eq!(report.warnings, 1);
    assert_eq!(
        fs::read(output.join("romfs/Pack/Broken.pack")).unwrap(),
        b"not an archive"
    );
}

#[test]
fn record_tables_package_into_one_changelog_and_merge_back() {
    let dir = tempdir().unwrap();
    let game = dir.path().join("game");
    let mod_root = dir.path().join("mod");
    let packaged = dir.path().join("packaged");
    let merged = dir.path().join("merged");

    let record = |hash: u32, value: i32| -> Document {
        [
            ("Hash", Document::UInt32(hash)),
            ("DefaultValue", Document::Int32(value)),
            ("ResetTypeValue", Document::Int32(0)),
            ("SaveFileIndex", Document::Int32(0)),
        ]
        .into_iter()
        .collect()
    };
    let tables = |records: Vec<Document>| -> Document {
        let data: Document = [("Int", Document::Array(records))].into_iter().collect();
        [("Data", data)].into_iter().collect()
    };
    let original = tables(vec![record(1, 5)]);
    let modified = tables(vec![record(1, 6), record(2, 7)]);
    let name = "GameData/GameDataList.Product.110.byml.zs";
    write(&game.join(name), &encode(&original));
    write(&mod_root.join(name), &encode(&modified));

    Packager::new(context(&game), &mod_root, &packaged).run().unwrap();
    let changelog = fs::read(packaged.join("romfs/GameData/GameDataList.gdlchangelog")).unwrap();
    assert_eq!(&changelog[..5], b"GDLCL");
    assert!(!packaged.join("romfs").join(name).exists());

    Merger::new(context(&game), [&packaged], &merged).run().unwrap();
    assert_eq!(decode(&fs::read(merged.join(name)).unwrap()), modified);
    assert!(!merged.join("GameData/GameDataList.gdlchangelog").exists());
}

#[test]
fn record_tables_need_a_reference() {
    let dir = tempdir().unwrap();
    let mod_root = dir.path().join("mod");
    write(
        &mod_root.join("GameData/GameDataList.Product.110.byml.zs"),
        &encode(&Document::Map(Default::default())),
    );
    let err = Packager::new(context(&dir.path().join("game")), &mod_root, dir.path().join("out"))
        .run()
        .unwrap_err();
    assert!(matches!(err, OverlayError::MissingReference(_)));
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

#[test]
fn mods_merge_in_priority_order() {
    let dir = tempdir().unwrap();
    let game = dir.path().join("game");
    let base = encode(&ints(&[1]));
    write(&game.join("Banc/List.byml"), &base);

    let handler = DocumentHandler::default();
    for (name, value) in [("low", 2), ("high", 3)] {
        let packaged = handler
            .package("Banc/List.byml", &base, &encode(&ints(&[1, value])))
            .unwrap();
        write(
            &dir.path().join(name).join("romfs/Banc/List.byml"),
            &packaged.bytes,
        );
    }

    let merged = dir.path().join("merged");
    let mods = [dir.path().join("low"), dir.path().join("high")];
    overlay::join(Merger::new(context(&game), &mods, &merged).spawn()).unwrap();
    assert_eq!(
        decode(&fs::read(merged.join("Banc/List.byml")).unwrap()),
        ints(&[1, 2, 3])
    );
}

#[test]
fn invalid_archive_overwrites_by_priority() {
    let dir = tempdir().unwrap();
    let game = dir.path().join("game");
    write(
        &game.join("Pack/Thing.pack"),
        &pack(vec![("a.bin", b"a".to_vec())]),
    );
    write(&dir.path().join("mod/romfs/Pack/Thing.pack"), b"junk");

    let merged = dir.path().join("merged");
    let report = Merger::new(context(&game), [dir.path().join("mod")], &merged)
        .run()
        .unwrap();
    assert_eq!(report.copied, 1);
    assert_eq!(fs::read(merged.join("Pack/Thing.pack")).unwrap(), b"junk");
}

#[test]
fn missing_mod_folder_is_an_error() {
    let dir = tempdir().unwrap();
    let err = Merger::new(context(dir.path()), [dir.path().join("nope")], dir.path().join("out"))
        .run()
        .unwrap_err();
    assert!(matches!(err, OverlayError::MissingMod(_)));
}

#[test]
fn shop_overflow_spills_into_the_next_shop() {
    let dir = tempdir().unwrap();
    let game = dir.path().join("game");
    let ctx = Context::new(&game)
        .with_fingerprints(FingerprintIndex::new())
        .with_shops_path(dir.path().join("shops.json"));
    fs::write(
        dir.path().join("shops.json"),
        r#"[{"NPC ActorName": "Npc_A"}, {"NPC ActorName": "Npc_B"}]"#,
    )
    .unwrap();

    let shop = |actor: &str, count: usize| -> Vec<u8> {
        let goods: Vec<Document> = (0..count)
            .map(|i| [("Actor", format!("Item_{i}"))].into_iter().collect())
            .collect();
        let param: Document = [("GoodsList", Document::Array(goods))].into_iter().collect();
        pack(vec![(shop_param_key(actor).as_str(), encode(&param))])
    };
    write_content(
        &dir.path().join("mod/romfs/Pack/Actor/Npc_A.pack.zs"),
        &shop("Npc_A", 113),
        ctx.compression(),
    )
    .unwrap();
    write_content(
        &game.join("Pack/Actor/Npc_B.pack.zs"),
        &shop("Npc_B", 5),
        ctx.compression(),
    )
    .unwrap();

    let merged = dir.path().join("merged");
    Merger::new(ctx.clone(), [dir.path().join("mod")], &merged)
        .run()
        .unwrap();

    let goods = |actor: &str| -> Vec<Document> {
        let bytes = read_content(
            &merged.join(format!("Pack/Actor/{actor}.pack.zs")),
            ctx.compression(),
        )
        .unwrap();
        let entries = PackedArchiveFormat.decode(&bytes).unwrap();
        let param = decode(entries.get(&shop_param_key(actor)).unwrap());
        param.get("GoodsList").unwrap().as_array().unwrap().clone()
    };
    assert_eq!(goods("Npc_A").len(), overlay::SHOP_CAPACITY);
    let b = goods("Npc_B");
    assert_eq!(b.len(), 7);
    assert_eq!(b[5].get("Actor").unwrap().as_str(), Some("Item_112"));
    assert_eq!(b[6].get("Actor").unwrap().as_str(), Some("Item_111"));
}

// ---------------------------------------------------------------------------
// Assembling
// ---------------------------------------------------------------------------

#[test]
fn loose_documents_move_into_their_archive() {
    let dir = tempdir().unwrap();
    let game = dir.path().join("game");
    let mod_root = dir.path().join("mod").join("romfs");
    let old: Document = [("v", 1)].into_iter().collect();
    let new: Document = [("v", 2)].into_iter().collect();
    write(
        &game.join("Pack/Actor/Npc.pack"),
        &pack(vec![
            ("Banc/Npc.byml", encode(&old)),
            ("Other.bin", b"x".to_vec()),
        ]),
    );
    write(&mod_root.join("Banc/Npc.byml"), &encode(&new));
    write(&mod_root.join("Banc/Unmapped.byml"), &encode(&new));

    let mut cache = ArchiveLocationCache::new();
    cache.insert("Banc/Npc.byml", "Pack/Actor/Npc.pack");
    let ctx = context(&game).with_archive_cache(cache);

    let report = Assembler::new(ctx, dir.path().join("mod")).run().unwrap();
    assert_eq!(report.written, 1);
    assert!(!mod_root.join("Banc/Npc.byml").exists());
    assert!(mod_root.join("Banc/Unmapped.byml").exists());

    let archive = unpack(&mod_root.join("Pack/Actor/Npc.pack"));
    assert_eq!(decode(archive.get("Banc/Npc.byml").unwrap()), new);
    assert_eq!(archive.get("Other.bin").unwrap(), b"x");
}

#[test]
fn assembling_without_any_archive_warns() {
    let dir = tempdir().unwrap();
    let mod_root = dir.path().join("mod");
    write(&mod_root.join("Banc/Npc.byml"), &encode(&ints(&[1])));
    let mut cache = ArchiveLocationCache::new();
    cache.insert("Banc/Npc.byml", "Pack/Actor/Npc.pack");
    let ctx = context(&dir.path().join("game")).with_archive_cache(cache);

    let report = Assembler::new(ctx, &mod_root).run().unwrap();
    assert_eq!(report.warnings, 1);
    assert!(mod_root.join("Banc/Npc.byml").exists());
}
